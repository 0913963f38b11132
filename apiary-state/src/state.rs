//! State file structures

use serde::{Deserialize, Serialize};

use apiary_core::resource::{Computed, ResourceKind, ResourceSpec};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental
    /// overwrites with an unrelated state)
    pub lineage: String,
    /// Version of Apiary that last modified this state
    pub apiary_version: String,
    /// All managed resources and their last-applied state
    pub resources: Vec<ResourceRecord>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            apiary_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and stamp the tool version for a new write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.apiary_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, kind: ResourceKind, name: &str) -> Option<&ResourceRecord> {
        self.resources
            .iter()
            .find(|r| r.kind == kind && r.name == name)
    }

    pub fn find_resource_mut(
        &mut self,
        kind: ResourceKind,
        name: &str,
    ) -> Option<&mut ResourceRecord> {
        self.resources
            .iter_mut()
            .find(|r| r.kind == kind && r.name == name)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, record: ResourceRecord) {
        if let Some(existing) = self.find_resource_mut(record.kind, &record.name) {
            *existing = record;
        } else {
            self.resources.push(record);
        }
    }

    /// Remove a resource from the state
    pub fn remove_resource(&mut self, kind: ResourceKind, name: &str) -> Option<ResourceRecord> {
        self.resources
            .iter()
            .position(|r| r.kind == kind && r.name == name)
            .map(|pos| self.resources.remove(pos))
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Last-applied state of a single managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub name: String,
    /// Remote record ID; stable once created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// The configuration this resource was last applied with. Sensitive
    /// fields are stripped by their serde attributes before landing
    /// here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<ResourceSpec>,
    #[serde(default)]
    pub computed: Computed,
}

impl ResourceRecord {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            identifier: None,
            spec: None,
            computed: Computed::default(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_spec(mut self, spec: ResourceSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn with_computed(mut self, computed: Computed) -> Self {
        self.computed = computed;
        self
    }
}
