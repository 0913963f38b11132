//! Manifest - Parse the TOML deployment manifest
//!
//! The manifest declares the fabric connection and the desired
//! resources. Records deserialize straight into the typed specs in
//! [`crate::resource`]; there is no intermediate attribute map.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resource::{
    GuestPoolSpec, RealmSpec, Resource, ResourceSpec, SharedStorageSpec, VirtualMachineSpec,
};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Manifest parse error: {0}")]
    Parse(#[from] Box<toml::de::Error>),

    #[error("{id}: {message}")]
    Invalid { id: String, message: String },
}

impl ManifestError {
    fn invalid(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            id: id.into(),
            message: message.into(),
        }
    }
}

fn default_realm() -> String {
    "local".to_string()
}

/// Fabric connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Hostname (optionally host:port) of the fabric controller
    pub host: String,
    pub username: String,
    /// Login password. May be omitted in the manifest and supplied via
    /// the environment instead; never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Authentication realm
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Accept the appliance's self-signed certificate
    #[serde(default)]
    pub insecure: bool,
}

fn default_vm_timeout() -> u64 {
    600
}

fn default_storage_timeout() -> u64 {
    180
}

fn default_poll_interval() -> u64 {
    5
}

fn default_capacity_interval() -> u64 {
    15
}

/// Per-operation deadlines and poll cadence, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_vm_timeout")]
    pub vm_create_secs: u64,
    #[serde(default = "default_vm_timeout")]
    pub vm_delete_secs: u64,
    #[serde(default = "default_storage_timeout")]
    pub storage_create_secs: u64,
    #[serde(default = "default_storage_timeout")]
    pub storage_delete_secs: u64,
    /// Fixed interval between task/guest status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Interval between retries while the cluster lacks capacity
    #[serde(default = "default_capacity_interval")]
    pub capacity_interval_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            vm_create_secs: default_vm_timeout(),
            vm_delete_secs: default_vm_timeout(),
            storage_create_secs: default_storage_timeout(),
            storage_delete_secs: default_storage_timeout(),
            poll_interval_secs: default_poll_interval(),
            capacity_interval_secs: default_capacity_interval(),
        }
    }
}

impl Timeouts {
    pub fn vm_create(&self) -> Duration {
        Duration::from_secs(self.vm_create_secs)
    }

    pub fn vm_delete(&self) -> Duration {
        Duration::from_secs(self.vm_delete_secs)
    }

    pub fn storage_create(&self) -> Duration {
        Duration::from_secs(self.storage_create_secs)
    }

    pub fn storage_delete(&self) -> Duration {
        Duration::from_secs(self.storage_delete_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn capacity_interval(&self) -> Duration {
        Duration::from_secs(self.capacity_interval_secs)
    }
}

/// The whole deployment manifest
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub connection: Connection,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub guest_pool: Vec<GuestPoolSpec>,
    #[serde(default)]
    pub realm: Vec<RealmSpec>,
    /// At most one shared storage pool per cluster
    #[serde(default)]
    pub shared_storage: Option<SharedStorageSpec>,
    #[serde(default)]
    pub virtual_machine: Vec<VirtualMachineSpec>,
}

impl Manifest {
    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(input).map_err(Box::new)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// All declared resources in creation order: shared storage first
    /// (pools and VMs may land disks on it), then realms, pools, VMs.
    /// Destroy runs the reverse.
    pub fn resources(&self) -> Vec<Resource> {
        let mut out = Vec::new();
        if let Some(storage) = &self.shared_storage {
            out.push(Resource::new(ResourceSpec::SharedStorage(storage.clone())));
        }
        for realm in &self.realm {
            out.push(Resource::new(ResourceSpec::Realm(realm.clone())));
        }
        for pool in &self.guest_pool {
            out.push(Resource::new(ResourceSpec::GuestPool(pool.clone())));
        }
        for vm in &self.virtual_machine {
            out.push(Resource::new(ResourceSpec::VirtualMachine(vm.clone())));
        }
        out
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.connection.host.is_empty() {
            return Err(ManifestError::invalid("connection", "host must be set"));
        }
        if self.connection.username.is_empty() {
            return Err(ManifestError::invalid("connection", "username must be set"));
        }

        for pool in &self.guest_pool {
            let id = format!("guest_pool.{}", pool.name);
            if pool.name.is_empty() {
                return Err(ManifestError::invalid("guest_pool", "name must be set"));
            }
            if pool.density[0] > pool.density[1] {
                return Err(ManifestError::invalid(
                    id.as_str(),
                    "density minimum exceeds maximum",
                ));
            }
            if pool.density[1] == 0 {
                return Err(ManifestError::invalid(id.as_str(), "density maximum must be >= 1"));
            }
        }

        for realm in &self.realm {
            if realm.name.is_empty() || realm.fqdn.is_empty() {
                return Err(ManifestError::invalid(
                    "realm",
                    "name and fqdn must be set",
                ));
            }
        }

        if let Some(storage) = &self.shared_storage {
            let id = format!("shared_storage.{}", storage.name);
            if storage.minimum_set_size == 0 {
                return Err(ManifestError::invalid(id.as_str(), "minimum_set_size must be >= 1"));
            }
            if storage.utilization == 0 || storage.utilization > 100 {
                return Err(ManifestError::invalid(
                    id.as_str(),
                    "utilization must be between 1 and 100",
                ));
            }
        }

        for vm in &self.virtual_machine {
            let id = format!("virtual_machine.{}", vm.name);
            if vm.name.is_empty() {
                return Err(ManifestError::invalid("virtual_machine", "name must be set"));
            }
            if vm.cpu == 0 {
                return Err(ManifestError::invalid(id.as_str(), "cpu must be >= 1"));
            }
            if vm.memory == 0 {
                return Err(ManifestError::invalid(id.as_str(), "memory must be >= 1"));
            }
            for iface in &vm.interface {
                if iface.vlan > 4094 {
                    return Err(ManifestError::invalid(id.as_str(), "vlan must be <= 4094"));
                }
            }
            if let Some(backup) = &vm.backup {
                if backup.frequency.is_empty() || backup.target.is_empty() {
                    return Err(ManifestError::invalid(
                        id.as_str(),
                        "backup requires frequency and target",
                    ));
                }
            }
        }

        self.check_duplicates()
    }

    fn check_duplicates(&self) -> Result<(), ManifestError> {
        let mut seen = std::collections::HashSet::new();
        for resource in self.resources() {
            if !seen.insert(resource.id.clone()) {
                return Err(ManifestError::invalid(
                    resource.id.to_string(),
                    "duplicate resource name",
                ));
            }
        }
        Ok(())
    }
}
