//! Resource - Typed resource records and their observed state
//!
//! Every resource kind has a statically typed configuration record.
//! Field access is compile-time checked; there is no string-keyed
//! attribute binding anywhere in the pipeline.

use serde::{Deserialize, Serialize};

/// The resource kinds the tool can manage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    GuestPool,
    Realm,
    SharedStorage,
    VirtualMachine,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::GuestPool => "guest_pool",
            ResourceKind::Realm => "realm",
            ResourceKind::SharedStorage => "shared_storage",
            ResourceKind::VirtualMachine => "virtual_machine",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest_pool" => Ok(ResourceKind::GuestPool),
            "realm" => Ok(ResourceKind::Realm),
            "shared_storage" => Ok(ResourceKind::SharedStorage),
            "virtual_machine" => Ok(ResourceKind::VirtualMachine),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}

/// Unique identifier for a resource within the manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

fn default_true() -> bool {
    true
}

fn default_storage() -> String {
    "disk".to_string()
}

fn default_shared_name() -> String {
    "shared".to_string()
}

fn default_min_set_size() -> u32 {
    3
}

fn default_utilization() -> u32 {
    75
}

fn default_firmware() -> String {
    "uefi".to_string()
}

fn default_display_driver() -> String {
    "cirrus".to_string()
}

fn default_disk_type() -> String {
    "Disk".to_string()
}

fn default_disk_driver() -> String {
    "virtio".to_string()
}

fn default_disk_format() -> String {
    "qcow2".to_string()
}

fn default_emulation() -> String {
    "virtio".to_string()
}

/// A VDI guest pool: a density-managed set of cloned guests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestPoolSpec {
    pub name: String,
    /// [min, max] guest count
    pub density: [u32; 2],
    /// vCPUs per guest; defaults to the template's when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    /// Memory (MB) per guest; defaults to the template's when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(default)]
    pub gpu: bool,
    #[serde(default)]
    pub persistent: bool,
    pub template: String,
    pub profile: String,
    pub seed: String,
    #[serde(default = "default_storage")]
    pub storage_type: String,
    #[serde(default = "default_storage")]
    pub storage_id: String,
}

/// Directory-service integration record (domain join)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealmSpec {
    /// NetBIOS name; doubles as the remote identity
    pub name: String,
    /// Fully qualified domain name
    pub fqdn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Service account username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Service account password. Sensitive: never serialized into the
    /// state file or logs.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// Cluster-wide shared storage pool, enabled through an asynchronous
/// cluster-level operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedStorageSpec {
    #[serde(default = "default_shared_name")]
    pub name: String,
    /// Minimum number of hosts required before the cluster will enable
    /// shared storage
    #[serde(default = "default_min_set_size")]
    pub minimum_set_size: u32,
    /// Percentage of local storage contributed to the shared pool
    #[serde(default = "default_utilization")]
    pub utilization: u32,
    /// Helper field to order this resource after hosts joining the
    /// cluster in the same run; never sent to the API
    #[serde(default)]
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpec {
    #[serde(rename = "type", default = "default_disk_type")]
    pub disk_type: String,
    pub storage_id: String,
    pub filename: String,
    #[serde(default = "default_disk_driver")]
    pub disk_driver: String,
    #[serde(default = "default_disk_format")]
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub network: String,
    pub vlan: u32,
    #[serde(default = "default_emulation")]
    pub emulation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSpec {
    pub enabled: bool,
    pub frequency: String,
    /// Target storage pool ID
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudInitSpec {
    #[serde(default)]
    pub user_data: String,
    #[serde(default)]
    pub network_config: String,
}

/// A standalone virtual machine (a pool of exactly one guest)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineSpec {
    pub name: String,
    pub cpu: u32,
    /// Memory in MB
    pub memory: u64,
    #[serde(default)]
    pub gpu: bool,
    #[serde(default = "default_firmware")]
    pub firmware: String,
    #[serde(default = "default_display_driver")]
    pub display_driver: String,
    pub os: String,
    #[serde(default = "default_true")]
    pub inject_agent: bool,
    #[serde(default)]
    pub disk: Vec<DiskSpec>,
    #[serde(default)]
    pub interface: Vec<InterfaceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_init: Option<CloudInitSpec>,
}

/// Desired configuration for one resource, statically typed per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    GuestPool(GuestPoolSpec),
    Realm(RealmSpec),
    SharedStorage(SharedStorageSpec),
    VirtualMachine(VirtualMachineSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::GuestPool(_) => ResourceKind::GuestPool,
            ResourceSpec::Realm(_) => ResourceKind::Realm,
            ResourceSpec::SharedStorage(_) => ResourceKind::SharedStorage,
            ResourceSpec::VirtualMachine(_) => ResourceKind::VirtualMachine,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceSpec::GuestPool(s) => &s.name,
            ResourceSpec::Realm(s) => &s.name,
            ResourceSpec::SharedStorage(s) => &s.name,
            ResourceSpec::VirtualMachine(s) => &s.name,
        }
    }

    /// Compare this desired record against an observed record of the
    /// same kind, returning the names of fields that differ.
    ///
    /// Optional fields the remote side defaults (guest pool cpu/memory)
    /// are only compared when the desired record pins them; an
    /// unspecified-but-defaulted value echoed back is not drift.
    pub fn changed_fields(&self, observed: &ResourceSpec) -> Vec<&'static str> {
        let mut changed = Vec::new();
        match (self, observed) {
            (ResourceSpec::GuestPool(want), ResourceSpec::GuestPool(have)) => {
                if want.density != have.density {
                    changed.push("density");
                }
                if want.cpu.is_some() && want.cpu != have.cpu {
                    changed.push("cpu");
                }
                if want.memory.is_some() && want.memory != have.memory {
                    changed.push("memory");
                }
                if want.gpu != have.gpu {
                    changed.push("gpu");
                }
                if want.persistent != have.persistent {
                    changed.push("persistent");
                }
                if want.template != have.template {
                    changed.push("template");
                }
                if want.profile != have.profile {
                    changed.push("profile");
                }
                if want.seed != have.seed {
                    changed.push("seed");
                }
                if want.storage_type != have.storage_type {
                    changed.push("storage_type");
                }
                if want.storage_id != have.storage_id {
                    changed.push("storage_id");
                }
            }
            (ResourceSpec::Realm(want), ResourceSpec::Realm(have)) => {
                // Only the FQDN is echoed back by the directory service;
                // credentials and flags are write-only.
                if want.fqdn != have.fqdn {
                    changed.push("fqdn");
                }
            }
            (ResourceSpec::SharedStorage(_), ResourceSpec::SharedStorage(_)) => {
                // Inputs are not echoed by the cluster; drift in them is
                // invisible remotely. Input changes force recreation and
                // are detected against the recorded state, not here.
            }
            (ResourceSpec::VirtualMachine(want), ResourceSpec::VirtualMachine(have)) => {
                if want.cpu != have.cpu {
                    changed.push("cpu");
                }
                if want.memory != have.memory {
                    changed.push("memory");
                }
                if want.gpu != have.gpu {
                    changed.push("gpu");
                }
                if want.firmware != have.firmware {
                    changed.push("firmware");
                }
                if want.display_driver != have.display_driver {
                    changed.push("display_driver");
                }
                if want.os != have.os {
                    changed.push("os");
                }
                if want.inject_agent != have.inject_agent {
                    changed.push("inject_agent");
                }
                if want.disk != have.disk {
                    changed.push("disk");
                }
                if want.interface != have.interface {
                    changed.push("interface");
                }
                if want.backup != have.backup {
                    changed.push("backup");
                }
                if want.cloud_init != have.cloud_init {
                    changed.push("cloud_init");
                }
            }
            _ => changed.push("kind"),
        }
        changed
    }
}

/// Desired state declared in the manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub spec: ResourceSpec,
}

impl Resource {
    pub fn new(spec: ResourceSpec) -> Self {
        Self {
            id: ResourceId::new(spec.kind(), spec.name().to_string()),
            spec,
        }
    }
}

/// Fields that exist only on the remote side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Computed {
    /// Pool / VM lifecycle state reported by the fabric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Storage pool name assigned by the cluster (shared storage only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_name: Option<String>,
    /// Storage pool type assigned by the cluster (shared storage only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_kind: Option<String>,
}

/// Current state fetched from the fabric
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Remote record ID; stable once created
    pub identifier: Option<String>,
    pub exists: bool,
    /// Echo of the configuration fields, when the API reports them
    pub observed: Option<ResourceSpec>,
    pub computed: Computed,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            exists: false,
            observed: None,
            computed: Computed::default(),
        }
    }

    pub fn existing(id: ResourceId, observed: ResourceSpec) -> Self {
        Self {
            id,
            identifier: None,
            exists: true,
            observed: Some(observed),
            computed: Computed::default(),
        }
    }

    /// An existing resource whose configuration the API does not echo
    pub fn existing_opaque(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            exists: true,
            observed: None,
            computed: Computed::default(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_computed(mut self, computed: Computed) -> Self {
        self.computed = computed;
        self
    }
}
