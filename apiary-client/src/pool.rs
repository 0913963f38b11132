//! Pool records
//!
//! A pool is the fabric's unit of guest provisioning: VDI pools carry a
//! density range, standalone VMs are pools pinned to exactly one guest.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Client;

pub const POOL_TYPE_VDI: &str = "vdi";
pub const POOL_TYPE_STANDALONE: &str = "standalone";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pool {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pool_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub seed: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub profile_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub storage_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub storage_type: String,
    /// [min, max] guest count
    pub density: Vec<u32>,
    pub inject_agent: bool,
    /// Lifecycle state; assigned by the fabric
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_profile: Option<GuestProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PoolBackup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuestProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vga: Option<String>,
    pub gpu: bool,
    pub persistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    /// [min, max] vCPUs; the fabric expects both ends pinned
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpu: Vec<u32>,
    /// [min, max] memory in MB
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mem: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_init: Option<PoolCloudInit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<PoolDisk>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<PoolInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolDisk {
    pub disk_driver: String,
    #[serde(rename = "type")]
    pub disk_type: String,
    pub storage_id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Assigned by the fabric once the disk exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolInterface {
    pub emulation: String,
    pub network: String,
    pub vlan: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolBackup {
    pub enabled: bool,
    pub frequency: String,
    pub target_storage_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolCloudInit {
    pub enabled: bool,
    pub user_data: String,
    pub network_config: String,
}

impl Client {
    pub async fn list_pools(&self) -> Result<Vec<Pool>, Error> {
        self.get_json("pools").await
    }

    pub async fn get_pool(&self, id: &str) -> Result<Pool, Error> {
        self.get_json(&format!("pool/{}", id)).await
    }

    /// The create call does not return the new record, so freshly
    /// created pools are resolved by name.
    pub async fn get_pool_by_name(&self, name: &str) -> Result<Pool, Error> {
        let pools = self.list_pools().await?;
        pools
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::Api {
                status: 404,
                message: format!("pool named {} not found", name),
            })
    }

    pub async fn create_pool(&self, pool: &Pool) -> Result<(), Error> {
        self.post_empty("pools", pool).await
    }

    pub async fn update_pool(&self, pool: &Pool) -> Result<(), Error> {
        self.put_empty(&format!("pool/{}", pool.id), pool).await
    }

    pub async fn delete_pool(&self, id: &str) -> Result<(), Error> {
        self.delete_path(&format!("pool/{}", id)).await
    }
}
