//! Storage pool records

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Client;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoragePool {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pool_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Client {
    pub async fn get_storage_pool(&self, id: &str) -> Result<StoragePool, Error> {
        self.get_json(&format!("storage/pool/{}", id)).await
    }
}
