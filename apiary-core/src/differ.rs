//! Differ - Compare desired records with observed state to produce a Plan
//!
//! Compares the desired records from the manifest with the state
//! fetched from the fabric and generates the list of required Effects.

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, ResourceSpec, State};

/// Result of a diff for one resource
#[derive(Debug, Clone)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs in-place update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_fields: Vec<&'static str>,
    },
    /// Resource exists but cannot be updated in place
    Replace {
        id: ResourceId,
        identifier: Option<String>,
        to: Resource,
        changed_fields: Vec<&'static str>,
    },
    /// Resource exists with no differences
    NoChange(ResourceId),
}

impl Diff {
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare one desired record against the fabric's state.
///
/// `recorded` is the configuration captured in the state file at the
/// last apply. It drives replacement detection for kinds whose inputs
/// the API does not echo back (shared storage).
pub fn diff(desired: &Resource, current: &State, recorded: Option<&ResourceSpec>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    if let ResourceSpec::SharedStorage(_) = &desired.spec {
        // No in-place update path on the cluster; any input change is
        // a disable-then-enable cycle.
        let changed = recorded
            .map(|r| desired.spec.changed_fields_recorded(r))
            .unwrap_or_default();
        if changed.is_empty() {
            return Diff::NoChange(desired.id.clone());
        }
        return Diff::Replace {
            id: desired.id.clone(),
            identifier: current.identifier.clone(),
            to: desired.clone(),
            changed_fields: changed,
        };
    }

    let changed = match &current.observed {
        Some(observed) => desired.spec.changed_fields(observed),
        None => Vec::new(),
    };

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_fields: changed,
        }
    }
}

impl ResourceSpec {
    /// Field comparison against the recorded (state-file) copy of the
    /// configuration, used where the remote side echoes nothing.
    fn changed_fields_recorded(&self, recorded: &ResourceSpec) -> Vec<&'static str> {
        match (self, recorded) {
            (ResourceSpec::SharedStorage(want), ResourceSpec::SharedStorage(had)) => {
                let mut changed = Vec::new();
                if want.minimum_set_size != had.minimum_set_size {
                    changed.push("minimum_set_size");
                }
                if want.utilization != had.utilization {
                    changed.push("utilization");
                }
                changed
            }
            _ => self.changed_fields(recorded),
        }
    }
}

/// Diff every desired record and collect the resulting Effects
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    recorded: &HashMap<ResourceId, ResourceSpec>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(resource, &current, recorded.get(&resource.id)) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { id, from, to, .. } => plan.add(Effect::Update { id, from, to }),
            Diff::Replace {
                id, identifier, to, ..
            } => plan.add(Effect::Replace { id, identifier, to }),
            Diff::NoChange(_) => {}
        }
    }

    plan
}

/// Build a deletion plan for the given targets, in the order given.
/// Callers pass targets already reversed relative to creation order.
pub fn destroy_plan(targets: &[(ResourceId, Option<String>)]) -> Plan {
    let mut plan = Plan::new();
    for (id, identifier) in targets {
        plan.add(Effect::Delete {
            id: id.clone(),
            identifier: identifier.clone(),
        });
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{RealmSpec, ResourceKind, SharedStorageSpec};

    fn realm(fqdn: &str) -> Resource {
        Resource::new(ResourceSpec::Realm(RealmSpec {
            name: "CORP".to_string(),
            fqdn: fqdn.to_string(),
            enabled: None,
            verified: None,
            tags: vec![],
            username: None,
            password: None,
        }))
    }

    fn shared(utilization: u32) -> Resource {
        Resource::new(ResourceSpec::SharedStorage(SharedStorageSpec {
            name: "shared".to_string(),
            minimum_set_size: 3,
            utilization,
            hosts: vec![],
        }))
    }

    #[test]
    fn diff_create_when_absent() {
        let desired = realm("corp.example.com");
        let current = State::not_found(desired.id.clone());

        assert!(matches!(diff(&desired, &current, None), Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_echoed_equal() {
        let desired = realm("corp.example.com");
        let current = State::existing(desired.id.clone(), desired.spec.clone())
            .with_identifier("CORP");

        assert!(!diff(&desired, &current, None).is_change());
    }

    #[test]
    fn diff_update_on_fqdn_change() {
        let desired = realm("corp.example.net");
        let current =
            State::existing(desired.id.clone(), realm("corp.example.com").spec.clone());

        match diff(&desired, &current, None) {
            Diff::Update { changed_fields, .. } => {
                assert_eq!(changed_fields, vec!["fqdn"]);
            }
            other => panic!("expected Update, got {:?}", other),
        }
    }

    #[test]
    fn shared_storage_input_change_forces_replace() {
        let desired = shared(90);
        let current = State::existing_opaque(desired.id.clone()).with_identifier("sp-1");
        let recorded = shared(75).spec;

        match diff(&desired, &current, Some(&recorded)) {
            Diff::Replace { changed_fields, .. } => {
                assert_eq!(changed_fields, vec!["utilization"]);
            }
            other => panic!("expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn shared_storage_without_recorded_spec_is_no_change() {
        let desired = shared(90);
        let current = State::existing_opaque(desired.id.clone());

        assert!(!diff(&desired, &current, None).is_change());
    }

    #[test]
    fn create_plan_mixes_creates_and_updates() {
        let resources = vec![realm("corp.example.net"), shared(75)];

        let mut current_states = HashMap::new();
        current_states.insert(
            resources[0].id.clone(),
            State::existing(resources[0].id.clone(), realm("corp.example.com").spec.clone()),
        );

        let plan = create_plan(&resources, &current_states, &HashMap::new());

        assert_eq!(plan.effects().len(), 2);
        assert!(matches!(plan.effects()[0], Effect::Update { .. }));
        assert!(matches!(plan.effects()[1], Effect::Create(_)));
    }

    #[test]
    fn destroy_plan_preserves_order() {
        let targets = vec![
            (
                ResourceId::new(ResourceKind::VirtualMachine, "jump"),
                Some("p1".to_string()),
            ),
            (ResourceId::new(ResourceKind::Realm, "CORP"), None),
        ];
        let plan = destroy_plan(&targets);
        assert_eq!(plan.effects().len(), 2);
        assert_eq!(plan.effects()[0].id().name, "jump");
    }
}
