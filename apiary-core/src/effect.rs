//! Effect - A single pending operation against the fabric
//!
//! Effects are values; nothing touches the remote API until the
//! interpreter executes them.

use crate::resource::{Resource, ResourceId, State};

/// One operation the apply engine will perform
#[derive(Debug, Clone)]
pub enum Effect {
    /// Refresh the observed state of a resource
    Read(ResourceId),
    Create(Resource),
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
    },
    Delete {
        id: ResourceId,
        /// Remote record ID from the recorded state, when known
        identifier: Option<String>,
    },
    /// The resource cannot be updated in place; it must be destroyed
    /// and created again
    Replace {
        id: ResourceId,
        identifier: Option<String>,
        to: Resource,
    },
}

impl Effect {
    /// Whether executing this effect mutates remote state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    pub fn id(&self) -> &ResourceId {
        match self {
            Effect::Read(id) => id,
            Effect::Create(r) => &r.id,
            Effect::Update { id, .. } => id,
            Effect::Delete { id, .. } => id,
            Effect::Replace { id, .. } => id,
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Read(id) => write!(f, "? {}", id),
            Effect::Create(r) => write!(f, "+ {}", r.id),
            Effect::Update { id, .. } => write!(f, "~ {}", id),
            Effect::Delete { id, .. } => write!(f, "- {}", id),
            Effect::Replace { id, .. } => write!(f, "-/+ {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;

    #[test]
    fn read_is_not_mutating() {
        let effect = Effect::Read(ResourceId::new(ResourceKind::Realm, "corp"));
        assert!(!effect.is_mutating());
    }

    #[test]
    fn delete_is_mutating() {
        let effect = Effect::Delete {
            id: ResourceId::new(ResourceKind::VirtualMachine, "jump"),
            identifier: Some("abc123".to_string()),
        };
        assert!(effect.is_mutating());
        assert_eq!(effect.to_string(), "- virtual_machine.jump");
    }
}
