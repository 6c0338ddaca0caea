//! Ontology-driven action gateway.
//!
//! Domain adapters register a schema (entities, properties, relationships,
//! actions, constraints, state machines) and typed handlers; the runtime
//! turns that registration into a guarded, auditable execution layer
//! reachable from APIs and from a natural-language pipeline.
//!
//! The pieces, leaves first:
//! - [`oag_core`]: the ontology registry and schema value types;
//! - [`oag_expr`]: the sandboxed constraint expression language;
//! - [`oag_guard`]: the pre-dispatch gate (state machines + constraints);
//! - [`oag_actions`]: action registry, dispatcher, HITL strategies;
//! - [`oag_query`]: dot-path semantic queries compiled to relational plans;
//! - [`oag_plan`]: dependency-ordered plan execution with rollback;
//! - [`oag_ooda`]: observe/orient/decide over registry metadata;
//! - [`oag_retrieval`]: vector-indexed schema slices for prompts;
//! - [`oag_events`]: the in-process event bus.
//!
//! This crate adds the domain-adapter contract, boot-time interface
//! verification, layered configuration, and the [`runtime::Runtime`]
//! facade that wires a chat turn end to end.

pub mod adapter;
pub mod config;
pub mod runtime;

pub use adapter::{boot, verify_interface_claims, DomainAdapter};
pub use config::{HitlConfig, OagConfig, RetrievalConfig, ThresholdConfig};
pub use runtime::{
    ConfirmationRequest, DispatchOptions, FollowupDescriptor, ProcessOutcome, Runtime,
    RuntimeBuilder,
};

pub use oag_actions as actions;
pub use oag_core as core;
pub use oag_events as events;
pub use oag_expr as expr;
pub use oag_guard as guard;
pub use oag_ooda as ooda;
pub use oag_plan as plan;
pub use oag_query as query;
pub use oag_retrieval as retrieval;
