//! OODA decision stack: observe (normalize/validate) → orient (intent
//! recognition + context) → decide (rule chain over registry metadata).
//!
//! The act step belongs to the dispatcher; this crate stops at a
//! `Decision` the caller either executes, confirms, or turns into a
//! follow-up prompt.

pub mod decide;
pub mod observe;
pub mod orient;

pub use decide::{DecidePhase, Decision, DecisionRule, IntentRule, MissingField, RegistryRule};
pub use observe::{InputValidator, MaxLength, NonEmpty, Observation, ObservePhase};
pub use orient::{
    ContextProvider, IntentRecognizer, IntentResult, Orientation, OrientPhase, StaticContext,
};
