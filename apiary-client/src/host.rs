//! Host records

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Client;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Host {
    pub hostid: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Client {
    pub async fn list_hosts(&self) -> Result<Vec<Host>, Error> {
        self.get_json("hosts").await
    }
}
