//! The ontology registry — single source of truth for the domain schema.
//!
//! Process-wide by intent but constructible, so tests can hold independent
//! registries. Reads take a shared lock and never block other readers;
//! writes (boot-time adapter registration, plugin load) take the exclusive
//! side. References handed out are clones — the registry owns the schema.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info};

use crate::action_spec::ActionSpec;
use crate::constraint::{ConstraintMetadata, WILDCARD_ACTION};
use crate::error::{OagError, Result};
use crate::interface_def::InterfaceDefinition;
use crate::metadata::{EntityMetadata, RelationshipMetadata};
use crate::model::EntityModel;
use crate::state_machine::StateMachine;

#[derive(Default)]
struct RegistryInner {
    entities: HashMap<String, EntityMetadata>,
    /// Actions by name, unique registry-wide. Entity ownership is on the spec.
    actions: HashMap<String, ActionSpec>,
    /// Registration order of action names, for deterministic listing.
    action_order: Vec<String>,
    /// Edges keyed by `(entity, target_entity)`.
    relationships: HashMap<(String, String), Vec<RelationshipMetadata>>,
    /// Constraints keyed by `(entity, action)`, in registration order.
    constraints: HashMap<(String, String), Vec<ConstraintMetadata>>,
    state_machines: HashMap<String, StateMachine>,
    interfaces: HashMap<String, InterfaceDefinition>,
    /// interface name -> claiming entity names.
    interface_impls: HashMap<String, Vec<String>>,
    models: HashMap<String, Arc<dyn EntityModel>>,
}

/// In-memory schema of record (entities, properties, relationships, actions,
/// constraints, state machines, interface claims, model bindings).
#[derive(Default)]
pub struct OntologyRegistry {
    inner: RwLock<RegistryInner>,
}

impl OntologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────

    /// Insert or replace an entity by name. A replacement preserves the
    /// relationships previously registered for that entity.
    pub fn register_entity(&self, mut entity: EntityMetadata) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(existing) = inner.entities.get(&entity.name) {
            for rel in &existing.relationships {
                if entity.relationship(&rel.name).is_none() {
                    entity.add_relationship(rel.clone());
                }
            }
        }
        debug!(entity = %entity.name, "registered entity");
        inner.entities.insert(entity.name.clone(), entity);
    }

    /// Register an action spec. The owning entity must already exist and the
    /// action name must be unique across the registry.
    pub fn register_action(&self, spec: ActionSpec) -> Result<()> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if !inner.entities.contains_key(&spec.entity) {
            return Err(OagError::UnknownEntity(spec.entity.clone()));
        }
        if inner.actions.contains_key(&spec.name) {
            return Err(OagError::AlreadyRegistered {
                kind: "action",
                name: spec.name.clone(),
            });
        }
        debug!(action = %spec.name, entity = %spec.entity, "registered action");
        inner.action_order.push(spec.name.clone());
        inner.actions.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Attach a relationship to an entity and record it in the global edge
    /// map. The entity need not be registered yet; the edge is re-attached
    /// when it arrives. Duplicate names on the same entity are rejected.
    pub fn register_relationship(
        &self,
        entity: &str,
        relationship: RelationshipMetadata,
    ) -> Result<()> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(owner) = inner.entities.get(entity) {
            if owner.relationship(&relationship.name).is_some() {
                return Err(OagError::AlreadyRegistered {
                    kind: "relationship",
                    name: format!("{}.{}", entity, relationship.name),
                });
            }
        }
        let key = (entity.to_string(), relationship.target_entity.clone());
        let edges = inner.relationships.entry(key).or_default();
        if edges.iter().any(|r| r.name == relationship.name) {
            return Err(OagError::AlreadyRegistered {
                kind: "relationship",
                name: format!("{}.{}", entity, relationship.name),
            });
        }
        edges.push(relationship.clone());
        if let Some(owner) = inner.entities.get_mut(entity) {
            owner.add_relationship(relationship);
        }
        Ok(())
    }

    /// Index a constraint under `(entity, action)`; `action == "*"` applies
    /// to every action of the entity.
    pub fn register_constraint(&self, constraint: ConstraintMetadata) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let key = (constraint.entity.clone(), constraint.action.clone());
        inner.constraints.entry(key).or_default().push(constraint);
    }

    /// At most one state machine per entity. Re-registering the identical
    /// topology is idempotent; a different topology is a conflict.
    pub fn register_state_machine(&self, machine: StateMachine) -> Result<()> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(existing) = inner.state_machines.get(&machine.entity) {
            if existing.same_topology(&machine) {
                return Ok(());
            }
            return Err(OagError::ConflictingStateMachine(machine.entity.clone()));
        }
        inner.state_machines.insert(machine.entity.clone(), machine);
        Ok(())
    }

    pub fn register_interface(&self, interface: InterfaceDefinition) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.interfaces.insert(interface.name.clone(), interface);
    }

    pub fn register_interface_implementation(&self, interface_name: &str, entity_name: &str) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let impls = inner
            .interface_impls
            .entry(interface_name.to_string())
            .or_default();
        if !impls.iter().any(|e| e == entity_name) {
            impls.push(entity_name.to_string());
        }
    }

    /// Bind a registered entity name to the persistence model the query
    /// executor runs against. Opaque to the core.
    pub fn register_model(&self, name: &str, model: Arc<dyn EntityModel>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.models.insert(name.to_string(), model);
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn get_entity(&self, name: &str) -> Option<EntityMetadata> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .entities
            .get(name)
            .cloned()
    }

    pub fn get_entities(&self) -> Vec<EntityMetadata> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut entities: Vec<EntityMetadata> = inner.entities.values().cloned().collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        entities
    }

    pub fn get_entity_names(&self) -> Vec<String> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut names: Vec<String> = inner.entities.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registry-wide action lookup by unique name.
    pub fn get_action_by_name(&self, name: &str) -> Option<ActionSpec> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .actions
            .get(name)
            .cloned()
    }

    /// Action lookup scoped to an entity.
    pub fn get_action(&self, entity: &str, name: &str) -> Option<ActionSpec> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .actions
            .get(name)
            .filter(|a| a.entity == entity)
            .cloned()
    }

    /// All actions in registration order.
    pub fn get_actions(&self) -> Vec<ActionSpec> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .action_order
            .iter()
            .filter_map(|name| inner.actions.get(name).cloned())
            .collect()
    }

    pub fn get_actions_for_entity(&self, entity: &str) -> Vec<ActionSpec> {
        self.get_actions()
            .into_iter()
            .filter(|a| a.entity == entity)
            .collect()
    }

    /// Outgoing relationships of an entity, in registration order.
    pub fn get_relationships(&self, entity: &str) -> Vec<RelationshipMetadata> {
        let inner = self.inner.read().expect("registry lock poisoned");
        if let Some(owner) = inner.entities.get(entity) {
            return owner.relationships.clone();
        }
        // Entity not yet registered: collect from the edge map.
        let mut edges: Vec<RelationshipMetadata> = Vec::new();
        for ((source, _), rels) in inner.relationships.iter() {
            if source == entity {
                edges.extend(rels.iter().cloned());
            }
        }
        edges
    }

    /// Constraints for `(entity, action)` plus wildcard entries, in
    /// registration order (exact-action entries first, then wildcards).
    pub fn get_constraints(&self, entity: &str, action: &str) -> Vec<ConstraintMetadata> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut result = Vec::new();
        if let Some(exact) = inner
            .constraints
            .get(&(entity.to_string(), action.to_string()))
        {
            result.extend(exact.iter().cloned());
        }
        if action != WILDCARD_ACTION {
            if let Some(wild) = inner
                .constraints
                .get(&(entity.to_string(), WILDCARD_ACTION.to_string()))
            {
                result.extend(wild.iter().cloned());
            }
        }
        result
    }

    pub fn get_state_machine(&self, entity: &str) -> Option<StateMachine> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .state_machines
            .get(entity)
            .cloned()
    }

    pub fn get_interface(&self, name: &str) -> Option<InterfaceDefinition> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .interfaces
            .get(name)
            .cloned()
    }

    pub fn get_interface_implementations(&self) -> HashMap<String, Vec<String>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .interface_impls
            .clone()
    }

    pub fn get_model(&self, name: &str) -> Option<Arc<dyn EntityModel>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .models
            .get(name)
            .cloned()
    }

    pub fn get_model_map(&self) -> HashMap<String, Arc<dyn EntityModel>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .models
            .clone()
    }

    // ── Export ───────────────────────────────────────────────────

    /// Fully serializable schema tree used to seed prompts and retrieval
    /// indices. Condition code is omitted — consumers get the declarative
    /// text only.
    pub fn export_schema(&self) -> SchemaExport {
        let inner = self.inner.read().expect("registry lock poisoned");

        let mut entities: Vec<EntityExport> = inner
            .entities
            .values()
            .map(|e| EntityExport {
                name: e.name.clone(),
                description: e.description.clone(),
                table_name: e.table_name.clone(),
                category: e.category.clone(),
                is_aggregate_root: e.is_aggregate_root,
                extensions: e.extensions.clone().into_iter().collect(),
                properties: e.properties.values().cloned().collect(),
                relationships: e.relationships.iter().map(|r| r.to_display()).collect(),
            })
            .collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));

        let actions = inner
            .action_order
            .iter()
            .filter_map(|name| inner.actions.get(name).cloned())
            .collect();

        let mut state_machines: Vec<StateMachine> =
            inner.state_machines.values().cloned().collect();
        state_machines.sort_by(|a, b| a.entity.cmp(&b.entity));

        let mut constraints: Vec<ConstraintExport> = inner
            .constraints
            .values()
            .flatten()
            .map(|c| ConstraintExport {
                id: c.id.clone(),
                name: c.name.clone(),
                entity: c.entity.clone(),
                action: c.action.clone(),
                severity: c.severity,
                condition_text: c.condition_text.clone(),
                error_message: c.error_message.clone(),
            })
            .collect();
        constraints.sort_by(|a, b| a.id.cmp(&b.id));

        let mut interface_implementations: Vec<InterfaceImplExport> = inner
            .interface_impls
            .iter()
            .map(|(interface, entities)| InterfaceImplExport {
                interface: interface.clone(),
                entities: entities.clone(),
            })
            .collect();
        interface_implementations.sort_by(|a, b| a.interface.cmp(&b.interface));

        SchemaExport {
            entities,
            actions,
            state_machines,
            constraints,
            interface_implementations,
        }
    }

    /// Reset all in-memory state. For tests only.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        *inner = RegistryInner::default();
        info!("ontology registry cleared");
    }
}

// ── Export shapes ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SchemaExport {
    pub entities: Vec<EntityExport>,
    pub actions: Vec<ActionSpec>,
    pub state_machines: Vec<StateMachine>,
    pub constraints: Vec<ConstraintExport>,
    pub interface_implementations: Vec<InterfaceImplExport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityExport {
    pub name: String,
    pub description: String,
    pub table_name: String,
    pub category: String,
    pub is_aggregate_root: bool,
    pub extensions: Vec<(String, serde_json::Value)>,
    pub properties: Vec<crate::metadata::PropertyMetadata>,
    pub relationships: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstraintExport {
    pub id: String,
    pub name: String,
    pub entity: String,
    pub action: String,
    pub severity: crate::error::Severity,
    pub condition_text: String,
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceImplExport {
    pub interface: String,
    pub entities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_spec::ActionCategory;
    use crate::constraint::{ConstraintType, Severity};
    use crate::metadata::{Cardinality, PropertyMetadata, SemanticType};
    use crate::state_machine::StateTransition;

    fn sample_registry() -> OntologyRegistry {
        let registry = OntologyRegistry::new();
        registry.register_entity(
            EntityMetadata::new("Guest")
                .with_table("guests")
                .aggregate_root()
                .with_property(PropertyMetadata::new("name", SemanticType::String).required()),
        );
        registry.register_entity(EntityMetadata::new("StayRecord").with_table("stay_records"));
        registry
    }

    fn constraint(id: &str, entity: &str, action: &str) -> ConstraintMetadata {
        ConstraintMetadata {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            constraint_type: ConstraintType::BusinessRule,
            severity: Severity::Error,
            entity: entity.into(),
            action: action.into(),
            condition_text: String::new(),
            condition_code: None,
            error_message: "failed".into(),
            suggestion_message: None,
        }
    }

    #[test]
    fn test_register_and_lookup_action() {
        let registry = sample_registry();
        let spec = ActionSpec::new("update_guest", "Guest", ActionCategory::Mutation);
        registry.register_action(spec).unwrap();

        let found = registry.get_action_by_name("update_guest").unwrap();
        assert_eq!(found.entity, "Guest");
        assert!(registry
            .get_actions()
            .iter()
            .any(|a| a.name == "update_guest"));
    }

    #[test]
    fn test_duplicate_action_name_rejected() {
        let registry = sample_registry();
        registry
            .register_action(ActionSpec::new("update_guest", "Guest", ActionCategory::Mutation))
            .unwrap();
        let err = registry
            .register_action(ActionSpec::new(
                "update_guest",
                "StayRecord",
                ActionCategory::Mutation,
            ))
            .unwrap_err();
        assert!(matches!(err, OagError::AlreadyRegistered { kind: "action", .. }));
    }

    #[test]
    fn test_action_requires_entity() {
        let registry = OntologyRegistry::new();
        let err = registry
            .register_action(ActionSpec::new("x", "Missing", ActionCategory::Query))
            .unwrap_err();
        assert!(matches!(err, OagError::UnknownEntity(_)));
    }

    #[test]
    fn test_reregister_entity_preserves_relationships() {
        let registry = sample_registry();
        registry
            .register_relationship(
                "Guest",
                RelationshipMetadata::new("stays", "StayRecord", Cardinality::OneToMany)
                    .with_foreign_key("guest_id", "StayRecord"),
            )
            .unwrap();

        // Replacement carries no relationships of its own.
        registry.register_entity(EntityMetadata::new("Guest").with_table("guests_v2"));

        let guest = registry.get_entity("Guest").unwrap();
        assert_eq!(guest.table_name, "guests_v2");
        assert!(guest.relationship("stays").is_some());
    }

    #[test]
    fn test_duplicate_relationship_rejected() {
        let registry = sample_registry();
        registry
            .register_relationship(
                "Guest",
                RelationshipMetadata::new("stays", "StayRecord", Cardinality::OneToMany),
            )
            .unwrap();
        let err = registry
            .register_relationship(
                "Guest",
                RelationshipMetadata::new("stays", "StayRecord", Cardinality::OneToMany),
            )
            .unwrap_err();
        assert!(matches!(err, OagError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_constraints_union_with_wildcard_in_order() {
        let registry = sample_registry();
        registry.register_constraint(constraint("c_exact_1", "Guest", "update_guest"));
        registry.register_constraint(constraint("c_wild", "Guest", "*"));
        registry.register_constraint(constraint("c_exact_2", "Guest", "update_guest"));

        let found = registry.get_constraints("Guest", "update_guest");
        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c_exact_1", "c_exact_2", "c_wild"]);
    }

    #[test]
    fn test_state_machine_conflict() {
        let registry = sample_registry();
        let machine = StateMachine::new(
            "Guest",
            vec!["a".into(), "b".into()],
            vec![StateTransition::new("a", "b", "go")],
            "a",
        )
        .unwrap();
        registry.register_state_machine(machine.clone()).unwrap();
        // Identical topology is idempotent.
        registry.register_state_machine(machine).unwrap();

        let different = StateMachine::new(
            "Guest",
            vec!["a".into(), "b".into(), "c".into()],
            vec![StateTransition::new("a", "c", "go")],
            "a",
        )
        .unwrap();
        let err = registry.register_state_machine(different).unwrap_err();
        assert!(matches!(err, OagError::ConflictingStateMachine(_)));
    }

    #[test]
    fn test_export_schema_is_json_safe() {
        let registry = sample_registry();
        registry
            .register_action(
                ActionSpec::new("update_guest", "Guest", ActionCategory::Mutation)
                    .with_description("Update guest profile"),
            )
            .unwrap();
        registry.register_constraint(constraint("c1", "Guest", "*"));
        registry.register_interface_implementation("Auditable", "Guest");

        let export = registry.export_schema();
        let json = serde_json::to_string(&export).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["entities"][0]["name"], "Guest");
        assert_eq!(value["actions"][0]["name"], "update_guest");
        assert_eq!(value["interface_implementations"][0]["interface"], "Auditable");
    }

    #[test]
    fn test_clear_resets_state() {
        let registry = sample_registry();
        registry.clear();
        assert!(registry.get_entities().is_empty());
        assert!(registry.get_actions().is_empty());
    }
}
