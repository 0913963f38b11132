//! Shared storage reconciliation
//!
//! Shared storage is a cluster-level singleton driven by asynchronous
//! tasks. Enabling reports "Not enough hosts" until the cluster reaches
//! the minimum set size; that is the transient precondition and the
//! whole enable+wait sequence is retried. Disabling retries start and
//! wait errors until the deadline; a failed task is always fatal.

use apiary_client::{Error, Retry, retry_until};
use apiary_core::provider::{ProviderError, ProviderResult};
use apiary_core::resource::{Computed, ResourceId, SharedStorageSpec, State};

use crate::provider::{HiveProvider, api_error};

fn is_capacity_error(err: &Error) -> bool {
    matches!(err, Error::Api { message, .. } if message.contains("Not enough hosts"))
}

fn storage_state(id: &ResourceId, storage: apiary_client::storage::StoragePool) -> State {
    State::existing_opaque(id.clone())
        .with_identifier(storage.id)
        .with_computed(Computed {
            state: storage.state,
            storage_name: Some(storage.name),
            storage_kind: Some(storage.pool_type),
        })
}

impl HiveProvider {
    pub(crate) async fn read_shared_storage(&self, id: &ResourceId) -> ProviderResult<State> {
        let cluster_id = self
            .client
            .cluster_id()
            .await
            .map_err(|e| api_error("failed to resolve cluster", e, id))?;
        let cluster = self
            .client
            .get_cluster(&cluster_id)
            .await
            .map_err(|e| api_error("failed to read cluster", e, id))?;

        let Some(shared) = cluster.shared_storage.filter(|s| !s.id.is_empty()) else {
            return Ok(State::not_found(id.clone()));
        };

        match self.client.get_storage_pool(&shared.id).await {
            Ok(storage) => Ok(storage_state(id, storage)),
            Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
            Err(e) => Err(api_error("failed to read storage pool", e, id)),
        }
    }

    pub(crate) async fn create_shared_storage(
        &self,
        id: &ResourceId,
        spec: &SharedStorageSpec,
    ) -> ProviderResult<State> {
        let cluster_id = self
            .client
            .cluster_id()
            .await
            .map_err(|e| api_error("failed to resolve cluster", e, id))?;

        // Capacity visibility only; the enable call is the authority.
        if let Ok(hosts) = self.client.list_hosts().await {
            tracing::info!(
                hosts = hosts.len(),
                required = spec.minimum_set_size,
                "enabling shared storage"
            );
        }

        let client = &self.client;
        let cluster_id_ref = cluster_id.as_str();
        let utilization = spec.utilization;
        let set_size = spec.minimum_set_size;
        let poll = self.timeouts.poll_interval;
        let deadline = self.timeouts.storage_create;

        retry_until(self.timeouts.capacity_interval, deadline, || async move {
            let task = match client
                .enable_shared_storage(cluster_id_ref, utilization, set_size)
                .await
            {
                Ok(task) => task,
                Err(e) if is_capacity_error(&e) => return Err(Retry::Transient(e)),
                Err(e) => return Err(Retry::Permanent(e)),
            };
            match task.wait(client, poll, deadline).await {
                Ok(_) => Ok(()),
                Err(e) => Err(Retry::Permanent(e)),
            }
        })
        .await
        .map_err(|e| api_error("failed to enable shared storage", e, id))?;

        // The enable task does not name the pool; re-read the cluster
        // to find it.
        let cluster = self
            .client
            .get_cluster(&cluster_id)
            .await
            .map_err(|e| api_error("failed to read cluster", e, id))?;
        let storage_id = cluster
            .shared_storage
            .filter(|s| !s.id.is_empty())
            .map(|s| s.id)
            .ok_or_else(|| {
                ProviderError::new("storage pool not found in database").for_resource(id.clone())
            })?;

        match self.client.get_storage_pool(&storage_id).await {
            Ok(storage) => Ok(storage_state(id, storage)),
            Err(e) if e.is_not_found() => Err(ProviderError::new(
                "storage pool not found in database",
            )
            .for_resource(id.clone())),
            Err(e) => Err(api_error("failed to read storage pool", e, id)),
        }
    }

    pub(crate) async fn delete_shared_storage(&self, id: &ResourceId) -> ProviderResult<()> {
        let client = &self.client;
        let poll = self.timeouts.poll_interval;
        let deadline = self.timeouts.storage_delete;

        retry_until(poll, deadline, || async move {
            let cluster_id = match client.cluster_id().await {
                Ok(cluster_id) => cluster_id,
                Err(e) => return Err(Retry::Permanent(e)),
            };
            let cluster = match client.get_cluster(&cluster_id).await {
                Ok(cluster) => cluster,
                Err(e) => return Err(Retry::Permanent(e)),
            };
            // Already disabled counts as deleted.
            if cluster
                .shared_storage
                .as_ref()
                .map(|s| s.id.is_empty())
                .unwrap_or(true)
            {
                return Ok(());
            }

            let task = match client.disable_shared_storage(&cluster_id).await {
                Ok(task) => task,
                Err(e) => return Err(Retry::Transient(e)),
            };
            match task.wait(client, poll, deadline).await {
                Ok(_) => Ok(()),
                Err(e @ Error::TaskFailed { .. }) => Err(Retry::Permanent(e)),
                Err(e) => Err(Retry::Transient(e)),
            }
        })
        .await
        .map_err(|e| api_error("failed to disable shared storage", e, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{fast_provider, mock_auth};
    use apiary_core::resource::ResourceKind;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec() -> SharedStorageSpec {
        SharedStorageSpec {
            name: "shared".to_string(),
            minimum_set_size: 3,
            utilization: 80,
            hosts: vec![],
        }
    }

    fn id() -> ResourceId {
        ResourceId::new(ResourceKind::SharedStorage, "shared")
    }

    async fn mock_cluster_basics(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "c1"}])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/hosts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"hostid": "h1", "hostname": "hive-1"},
                {"hostid": "h2", "hostname": "hive-2"},
                {"hostid": "h3", "hostname": "hive-3"}
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn enable_retries_through_capacity_errors() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;
        mock_cluster_basics(&server).await;

        // Two capacity rejections, then the enable goes through.
        Mock::given(method("POST"))
            .and(path("/api/cluster/c1/sharedstorage/enable"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": 400, "message": "Not enough hosts"
            })))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/cluster/c1/sharedstorage/enable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t9", "state": "queued", "message": ""
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/task/t9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t9", "state": "completed", "message": ""
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cluster/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "c1", "sharedStorage": {"id": "sp-1", "enabled": true}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/storage/pool/sp-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sp-1", "name": "HF_Shared", "type": "hf"
            })))
            .mount(&server)
            .await;

        let state = provider.create_shared_storage(&id(), &spec()).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("sp-1"));
        assert_eq!(state.computed.storage_name.as_deref(), Some("HF_Shared"));
        assert_eq!(state.computed.storage_kind.as_deref(), Some("hf"));
    }

    #[tokio::test]
    async fn failed_enable_task_surfaces_remote_message() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;
        mock_cluster_basics(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/cluster/c1/sharedstorage/enable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t9", "state": "queued", "message": ""
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/task/t9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t9", "state": "failed", "message": "disk allocation error"
            })))
            .mount(&server)
            .await;

        let err = provider
            .create_shared_storage(&id(), &spec())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk allocation error"));
    }

    #[tokio::test]
    async fn capacity_error_converts_to_timeout_at_deadline() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;
        mock_cluster_basics(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/cluster/c1/sharedstorage/enable"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": 400, "message": "Not enough hosts"
            })))
            .mount(&server)
            .await;

        let err = provider
            .create_shared_storage(&id(), &spec())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("Not enough hosts"));
    }

    #[tokio::test]
    async fn read_reports_absent_when_cluster_has_none() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "c1"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cluster/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1"})))
            .mount(&server)
            .await;

        let state = provider.read_shared_storage(&id()).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn disable_waits_for_task_and_succeeds() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "c1"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cluster/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "c1", "sharedStorage": {"id": "sp-1", "enabled": true}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/cluster/c1/sharedstorage/disable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t10", "state": "running", "message": ""
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/task/t10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t10", "state": "completed", "message": ""
            })))
            .mount(&server)
            .await;

        provider.delete_shared_storage(&id()).await.unwrap();
    }

    #[tokio::test]
    async fn disable_of_already_absent_storage_succeeds() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        let provider = fast_provider(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "c1"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cluster/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1"})))
            .mount(&server)
            .await;

        provider.delete_shared_storage(&id()).await.unwrap();
    }
}
