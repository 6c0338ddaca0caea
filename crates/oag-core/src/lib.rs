//! Ontology registry core — the schema of record for the action gateway.
//!
//! Pure value types and an in-memory registry; no I/O, no persistence
//! dependencies. Domain adapters populate the registry at boot; every other
//! component (guard, dispatcher, query compiler, retriever) reads it.

pub mod action_spec;
pub mod constraint;
pub mod error;
pub mod interface_def;
pub mod metadata;
pub mod model;
pub mod principal;
pub mod registry;
pub mod state_machine;

pub use action_spec::{ActionCategory, ActionSpec, GlossaryExample, RiskLevel};
pub use constraint::{ConstraintMetadata, ConstraintType, WILDCARD_ACTION};
pub use error::{FieldError, OagError, Result, Severity, ValidationError, Violation};
pub use interface_def::InterfaceDefinition;
pub use metadata::{
    Cardinality, EntityMetadata, PropertyMetadata, RelationshipMetadata, SecurityLevel,
    SemanticType,
};
pub use model::{EntityModel, TableModel};
pub use principal::UserContext;
pub use registry::{OntologyRegistry, SchemaExport};
pub use state_machine::{StateMachine, StateMachineError, StateTransition};
