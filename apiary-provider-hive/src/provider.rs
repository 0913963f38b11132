//! HiveProvider - the remote-operation reconciler
//!
//! Holds the authenticated client and the per-operation deadlines.
//! The resource modules add the reconcile methods per kind.

use std::time::Duration;

use apiary_client::Client;
use apiary_core::manifest::Timeouts;
use apiary_core::provider::ProviderError;
use apiary_core::resource::ResourceId;

/// Deadlines and poll cadence for asynchronous remote operations.
/// Always explicit: there is no global retry state.
#[derive(Debug, Clone)]
pub struct ReconcileTimeouts {
    pub vm_create: Duration,
    pub vm_delete: Duration,
    pub storage_create: Duration,
    pub storage_delete: Duration,
    /// Fixed interval between task/guest status polls
    pub poll_interval: Duration,
    /// Interval between retries while the cluster lacks capacity
    pub capacity_interval: Duration,
}

impl Default for ReconcileTimeouts {
    fn default() -> Self {
        Self {
            vm_create: Duration::from_secs(600),
            vm_delete: Duration::from_secs(600),
            storage_create: Duration::from_secs(180),
            storage_delete: Duration::from_secs(180),
            poll_interval: Duration::from_secs(5),
            capacity_interval: Duration::from_secs(15),
        }
    }
}

impl From<&Timeouts> for ReconcileTimeouts {
    fn from(t: &Timeouts) -> Self {
        Self {
            vm_create: t.vm_create(),
            vm_delete: t.vm_delete(),
            storage_create: t.storage_create(),
            storage_delete: t.storage_delete(),
            poll_interval: t.poll_interval(),
            capacity_interval: t.capacity_interval(),
        }
    }
}

/// Provider for a Hive Fabric cluster
pub struct HiveProvider {
    pub(crate) client: Client,
    pub(crate) timeouts: ReconcileTimeouts,
}

impl HiveProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeouts: ReconcileTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ReconcileTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Wrap a client error with operation context and the resource it hit
pub(crate) fn api_error(
    context: &str,
    err: apiary_client::Error,
    id: &ResourceId,
) -> ProviderError {
    ProviderError::new(format!("{}: {}", context, err))
        .with_cause(err)
        .for_resource(id.clone())
}
