//! Guest template records
//!
//! Pools inherit OS, display driver, and sizing defaults from the
//! template they clone.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Client;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Template {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    pub vcpu: u32,
    /// Memory in MB
    pub mem: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Client {
    pub async fn get_template(&self, name: &str) -> Result<Template, Error> {
        self.get_json(&format!("template/{}", name)).await
    }
}
