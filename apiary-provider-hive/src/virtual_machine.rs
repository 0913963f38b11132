//! Standalone virtual machine reconciliation
//!
//! A VM is a pool pinned to density [1, 1]. Creation is asynchronous on
//! the fabric side: the pool record appears immediately, the guest
//! builds in the background, so create polls the guest until it settles
//! into a target state. Deletion polls for absence (a 404) rather than
//! a task object.

use apiary_client::guest::guest_name_for_pool;
use apiary_client::pool::{
    GuestProfile, POOL_TYPE_STANDALONE, Pool, PoolBackup, PoolCloudInit, PoolDisk, PoolInterface,
};
use apiary_client::{Error, Retry, retry_until};
use apiary_core::provider::ProviderResult;
use apiary_core::resource::{
    BackupSpec, CloudInitSpec, Computed, DiskSpec, InterfaceSpec, ResourceId, ResourceSpec, State,
    VirtualMachineSpec,
};

use crate::provider::{HiveProvider, api_error};

pub(crate) fn pool_from_spec(spec: &VirtualMachineSpec, id: Option<&str>) -> Pool {
    Pool {
        id: id.unwrap_or_default().to_string(),
        name: spec.name.clone(),
        pool_type: POOL_TYPE_STANDALONE.to_string(),
        density: vec![1, 1],
        inject_agent: spec.inject_agent,
        state: None,
        guest_profile: Some(GuestProfile {
            os: Some(spec.os.clone()),
            firmware: Some(spec.firmware.clone()),
            vga: Some(spec.display_driver.clone()),
            gpu: spec.gpu,
            cpu: vec![spec.cpu, spec.cpu],
            mem: vec![spec.memory, spec.memory],
            cloud_init: spec.cloud_init.as_ref().map(|ci| PoolCloudInit {
                enabled: true,
                user_data: ci.user_data.clone(),
                network_config: ci.network_config.clone(),
            }),
            disks: spec
                .disk
                .iter()
                .map(|d| PoolDisk {
                    disk_driver: d.disk_driver.clone(),
                    disk_type: d.disk_type.clone(),
                    storage_id: d.storage_id.clone(),
                    filename: d.filename.clone(),
                    format: Some(d.format.clone()),
                    size: None,
                })
                .collect(),
            interfaces: spec
                .interface
                .iter()
                .map(|i| PoolInterface {
                    emulation: i.emulation.clone(),
                    network: i.network.clone(),
                    vlan: i.vlan,
                })
                .collect(),
            ..Default::default()
        }),
        backup: spec.backup.as_ref().map(|b| PoolBackup {
            enabled: b.enabled,
            frequency: b.frequency.clone(),
            target_storage_id: b.target.clone(),
        }),
        ..Default::default()
    }
}

pub(crate) fn spec_from_pool(pool: &Pool) -> VirtualMachineSpec {
    let profile = pool.guest_profile.clone().unwrap_or_default();
    VirtualMachineSpec {
        name: pool.name.clone(),
        cpu: profile.cpu.first().copied().unwrap_or_default(),
        memory: profile.mem.first().copied().unwrap_or_default(),
        gpu: profile.gpu,
        firmware: profile.firmware.unwrap_or_default(),
        display_driver: profile.vga.unwrap_or_default(),
        os: profile.os.unwrap_or_default(),
        inject_agent: pool.inject_agent,
        disk: profile
            .disks
            .iter()
            .map(|d| DiskSpec {
                disk_type: d.disk_type.clone(),
                storage_id: d.storage_id.clone(),
                filename: d.filename.clone(),
                disk_driver: d.disk_driver.clone(),
                format: d.format.clone().unwrap_or_default(),
            })
            .collect(),
        interface: profile
            .interfaces
            .iter()
            .map(|i| InterfaceSpec {
                network: i.network.clone(),
                vlan: i.vlan,
                emulation: i.emulation.clone(),
            })
            .collect(),
        backup: pool.backup.as_ref().map(|b| BackupSpec {
            enabled: b.enabled,
            frequency: b.frequency.clone(),
            target: b.target_storage_id.clone(),
        }),
        cloud_init: profile.cloud_init.as_ref().filter(|ci| ci.enabled).map(|ci| {
            CloudInitSpec {
                user_data: ci.user_data.clone(),
                network_config: ci.network_config.clone(),
            }
        }),
    }
}

fn state_from_pool(id: &ResourceId, pool: &Pool) -> State {
    State::existing(id.clone(), ResourceSpec::VirtualMachine(spec_from_pool(pool)))
        .with_identifier(pool.id.clone())
        .with_computed(Computed {
            state: pool.state.clone(),
            ..Default::default()
        })
}

impl HiveProvider {
    pub(crate) async fn read_virtual_machine(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        match self.client.get_pool(identifier).await {
            Ok(pool) => Ok(state_from_pool(id, &pool)),
            Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
            Err(e) => Err(api_error("failed to read virtual machine", e, id)),
        }
    }

    pub(crate) async fn create_virtual_machine(
        &self,
        id: &ResourceId,
        spec: &VirtualMachineSpec,
    ) -> ProviderResult<State> {
        let pool = pool_from_spec(spec, None);

        tracing::info!(vm = %spec.name, "creating virtual machine");
        self.client
            .create_pool(&pool)
            .await
            .map_err(|e| api_error("failed to create virtual machine", e, id))?;

        let created = self
            .client
            .get_pool_by_name(&spec.name)
            .await
            .map_err(|e| api_error("created pool not found by name", e, id))?;

        // The guest record lags the pool; poll until the fabric reports
        // it settled into a target state.
        let guest_name = guest_name_for_pool(&spec.name);
        let client = &self.client;
        let guest_name = guest_name.as_str();
        let pool_id = created.id.as_str();
        retry_until(
            self.timeouts.poll_interval,
            self.timeouts.vm_create,
            || async move {
                match client.get_guest(guest_name).await {
                    Ok(guest) if guest.is_ready() => Ok(()),
                    Ok(guest) => Err(Retry::Transient(Error::Pending(format!(
                        "pool {} building, guest {} is {}",
                        pool_id, guest_name, guest.guest_state
                    )))),
                    Err(e) if e.is_not_found() => Err(Retry::Transient(Error::Pending(format!(
                        "pool {} building, guest {} not registered yet",
                        pool_id, guest_name
                    )))),
                    Err(e) => Err(Retry::Permanent(e)),
                }
            },
        )
        .await
        .map_err(|e| api_error("virtual machine did not come up", e, id))?;

        self.read_virtual_machine(id, Some(&created.id)).await
    }

    pub(crate) async fn update_virtual_machine(
        &self,
        id: &ResourceId,
        identifier: &str,
        spec: &VirtualMachineSpec,
    ) -> ProviderResult<State> {
        let pool = pool_from_spec(spec, Some(identifier));
        self.client
            .update_pool(&pool)
            .await
            .map_err(|e| api_error("failed to update virtual machine", e, id))?;
        self.read_virtual_machine(id, Some(identifier)).await
    }

    pub(crate) async fn delete_virtual_machine(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<()> {
        let Some(identifier) = identifier else {
            return Ok(());
        };
        match self.client.get_pool(identifier).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(api_error("failed to read virtual machine", e, id)),
        }

        // A failed delete call aborts here; only the wait for
        // disappearance is retried.
        self.client
            .delete_pool(identifier)
            .await
            .map_err(|e| api_error("failed to delete virtual machine", e, id))?;

        tracing::info!(vm = %id.name, "waiting for deletion");
        let client = &self.client;
        retry_until(
            self.timeouts.poll_interval,
            self.timeouts.vm_delete,
            || async move {
                match client.get_pool(identifier).await {
                    // Gone is the terminal success condition.
                    Err(e) if e.is_not_found() => Ok(()),
                    Err(e) => Err(Retry::Permanent(e)),
                    Ok(pool) => Err(Retry::Transient(Error::Pending(format!(
                        "pool {} still present in state {}",
                        identifier,
                        pool.state.as_deref().unwrap_or("unknown")
                    )))),
                }
            },
        )
        .await
        .map_err(|e| api_error("virtual machine was not removed", e, id))
    }
}
