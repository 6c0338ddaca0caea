//! Domain adapter contract and boot sequence.
//!
//! Adapters carry all domain knowledge: entities, relationships, actions,
//! constraints, state machines, interface claims, model bindings. The boot
//! sequence runs every adapter, then structurally verifies interface
//! implementation claims against what the entities actually declare.

use oag_actions::ActionRegistry;
use oag_core::{OagError, OntologyRegistry, Result};
use tracing::info;

/// One domain's registration hook. Discovered by explicit listing at boot
/// or by whatever plugin-manifest pattern the host owns.
pub trait DomainAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Register schema: entities, relationships, constraints, state
    /// machines, interfaces, model bindings.
    fn register_ontology(&self, registry: &OntologyRegistry) -> Result<()>;

    /// Register executable actions (specs are mirrored into the ontology
    /// registry by the action registry).
    fn register_actions(
        &self,
        registry: &OntologyRegistry,
        actions: &ActionRegistry,
    ) -> Result<()>;
}

/// Run every adapter, then verify interface claims.
pub fn boot(
    adapters: &[&dyn DomainAdapter],
    registry: &OntologyRegistry,
    actions: &ActionRegistry,
) -> Result<()> {
    for adapter in adapters {
        adapter.register_ontology(registry)?;
        info!(adapter = adapter.name(), "ontology registered");
    }
    for adapter in adapters {
        adapter.register_actions(registry, actions)?;
        info!(adapter = adapter.name(), "actions registered");
    }
    verify_interface_claims(registry)
}

/// Structural check: every entity claiming an interface must declare the
/// interface's required properties and actions.
pub fn verify_interface_claims(registry: &OntologyRegistry) -> Result<()> {
    for (interface_name, entity_names) in registry.get_interface_implementations() {
        let Some(interface) = registry.get_interface(&interface_name) else {
            return Err(OagError::Internal(format!(
                "entity claims undefined interface '{interface_name}'"
            )));
        };
        for entity_name in entity_names {
            let entity = registry
                .get_entity(&entity_name)
                .ok_or_else(|| OagError::UnknownEntity(entity_name.clone()))?;

            for required in &interface.required_properties {
                if entity.property(required).is_none() {
                    return Err(OagError::Internal(format!(
                        "entity '{entity_name}' claims interface '{interface_name}' \
                         but does not declare property '{required}'"
                    )));
                }
            }
            let entity_actions = registry.get_actions_for_entity(&entity_name);
            for required in &interface.required_actions {
                if !entity_actions.iter().any(|a| &a.name == required) {
                    return Err(OagError::Internal(format!(
                        "entity '{entity_name}' claims interface '{interface_name}' \
                         but does not register action '{required}'"
                    )));
                }
            }
        }
    }
    Ok(())
}
