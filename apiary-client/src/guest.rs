//! Guest records
//!
//! Guests are fabric-named: derived from the pool name, uppercased,
//! with spaces replaced by underscores.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Client;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Guest {
    pub name: String,
    pub guest_state: String,
    /// States the fabric is currently driving the guest toward
    pub target_state: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
}

impl Guest {
    /// Whether the guest has settled into one of its target states
    pub fn is_ready(&self) -> bool {
        self.target_state.iter().any(|s| *s == self.guest_state)
    }
}

/// Derive the fabric's guest name for a pool
pub fn guest_name_for_pool(pool_name: &str) -> String {
    pool_name.to_uppercase().replace(' ', "_")
}

impl Client {
    pub async fn get_guest(&self, name: &str) -> Result<Guest, Error> {
        self.get_json(&format!("guest/{}", name)).await
    }
}
