//! Cluster records and cluster-level shared storage operations
//!
//! Enabling or disabling shared storage is asynchronous: the call
//! returns a task handle to poll. Enabling reports "Not enough hosts"
//! until the cluster reaches the minimum set size; callers treat that
//! as a transient precondition.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::task::Task;
use crate::Client;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_storage: Option<ClusterSharedStorage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSharedStorage {
    /// Storage pool ID backing the shared pool; empty until enabled
    pub id: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnableSharedStorageRequest {
    utilization: u32,
    min_set_size: u32,
}

impl Client {
    /// ID of the cluster this controller belongs to
    pub async fn cluster_id(&self) -> Result<String, Error> {
        let clusters: Vec<Cluster> = self.get_json("clusters").await?;
        clusters
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or_else(|| Error::Api {
                status: 404,
                message: "controller reports no cluster".to_string(),
            })
    }

    pub async fn get_cluster(&self, id: &str) -> Result<Cluster, Error> {
        self.get_json(&format!("cluster/{}", id)).await
    }

    pub async fn enable_shared_storage(
        &self,
        cluster_id: &str,
        utilization: u32,
        min_set_size: u32,
    ) -> Result<Task, Error> {
        self.post_json(
            &format!("cluster/{}/sharedstorage/enable", cluster_id),
            &EnableSharedStorageRequest {
                utilization,
                min_set_size,
            },
        )
        .await
    }

    pub async fn disable_shared_storage(&self, cluster_id: &str) -> Result<Task, Error> {
        self.post_json(
            &format!("cluster/{}/sharedstorage/disable", cluster_id),
            &serde_json::json!({}),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::connected_client;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn cluster_id_takes_first_listed() {
        let server = MockServer::start().await;
        let client = connected_client(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/clusters"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "c1"}, {"id": "c2"}])),
            )
            .mount(&server)
            .await;

        assert_eq!(client.cluster_id().await.unwrap(), "c1");
    }

    #[tokio::test]
    async fn empty_cluster_list_is_not_found() {
        let server = MockServer::start().await;
        let client = connected_client(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        assert!(client.cluster_id().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn enable_sends_capacity_parameters() {
        let server = MockServer::start().await;
        let client = connected_client(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/cluster/c1/sharedstorage/enable"))
            .and(body_json(json!({"utilization": 80, "minSetSize": 3})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "t9", "state": "queued", "message": ""})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let task = client.enable_shared_storage("c1", 80, 3).await.unwrap();
        assert_eq!(task.id, "t9");
    }
}
