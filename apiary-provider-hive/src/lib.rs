//! Apiary Hive Fabric Provider
//!
//! Maps the typed resource records onto Hive Fabric API calls and
//! drives asynchronous remote operations to completion.
//!
//! ## Module Structure
//!
//! - `provider` - HiveProvider and its reconcile deadlines
//! - `guest_pool` / `realm` / `shared_storage` / `virtual_machine` -
//!   per-kind translation and reconciliation

pub mod guest_pool;
pub mod provider;
pub mod realm;
pub mod shared_storage;
pub mod virtual_machine;

pub use provider::{HiveProvider, ReconcileTimeouts};

use apiary_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult};
use apiary_core::resource::{Resource, ResourceId, ResourceKind, ResourceSpec, State};

impl Provider for HiveProvider {
    fn name(&self) -> &'static str {
        "hive"
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move {
            match id.kind {
                ResourceKind::GuestPool => self.read_guest_pool(&id, identifier.as_deref()).await,
                ResourceKind::Realm => self.read_realm(&id).await,
                ResourceKind::SharedStorage => self.read_shared_storage(&id).await,
                ResourceKind::VirtualMachine => {
                    self.read_virtual_machine(&id, identifier.as_deref()).await
                }
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            match &resource.spec {
                ResourceSpec::GuestPool(spec) => self.create_guest_pool(&resource.id, spec).await,
                ResourceSpec::Realm(spec) => self.create_realm(&resource.id, spec).await,
                ResourceSpec::SharedStorage(spec) => {
                    self.create_shared_storage(&resource.id, spec).await
                }
                ResourceSpec::VirtualMachine(spec) => {
                    self.create_virtual_machine(&resource.id, spec).await
                }
            }
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move {
            match &to.spec {
                ResourceSpec::GuestPool(spec) => {
                    self.update_guest_pool(&id, &identifier, spec).await
                }
                ResourceSpec::Realm(spec) => self.update_realm(&id, spec).await,
                ResourceSpec::SharedStorage(_) => Err(ProviderError::new(
                    "shared storage cannot be updated in place; delete and recreate",
                )
                .for_resource(id)),
                ResourceSpec::VirtualMachine(spec) => {
                    self.update_virtual_machine(&id, &identifier, spec).await
                }
            }
        })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move {
            match id.kind {
                ResourceKind::GuestPool => self.delete_guest_pool(&id, identifier.as_deref()).await,
                ResourceKind::Realm => self.delete_realm(&id).await,
                ResourceKind::SharedStorage => self.delete_shared_storage(&id).await,
                ResourceKind::VirtualMachine => {
                    self.delete_virtual_machine(&id, identifier.as_deref()).await
                }
            }
        })
    }
}
