//! Action registry and dispatcher.
//!
//! Actions register a declarative spec (mirrored into the ontology
//! registry), a typed parameter model, and an async handler. Dispatch
//! validates parameters, checks the caller's role, gates mutations through
//! the guard executor, and forwards the handler outcome unchanged.
//! The HITL strategy stack answers confirmation questions from the same
//! registry metadata.

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod hitl;
pub mod params;
pub mod registry;

pub use context::{Extensions, HandlerContext, NullSession, PersistenceSession};
pub use dispatcher::{ActionDispatcher, DispatchContext};
pub use handler::{ActionHandler, ActionOutcome, FnHandler};
pub use hitl::{
    Composite, ConfirmAlways, ConfirmByPolicy, ConfirmByRisk, ConfirmByThreshold,
    ConfirmPolicies, HitlStrategy, PolicyBucket, RiskRule,
};
pub use params::{ParamSpec, ParamsModel, ValidatedParams};
pub use registry::{ActionRegistry, GlossaryEntry, RegisteredAction};
