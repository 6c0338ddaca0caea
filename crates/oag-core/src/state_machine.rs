//! Entity lifecycle state machines.

use serde::{Deserialize, Serialize};

/// A valid state transition. `trigger` is normally an action name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: String,
    pub to_state: String,
    pub trigger: String,
}

impl StateTransition {
    pub fn new(
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        trigger: impl Into<String>,
    ) -> Self {
        Self {
            from_state: from_state.into(),
            to_state: to_state.into(),
            trigger: trigger.into(),
        }
    }
}

/// Lifecycle state machine for one entity.
///
/// Invariants enforced at construction:
/// - every transition endpoint is a declared state;
/// - at most one transition per `(from_state, trigger)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMachine {
    pub entity: String,
    pub states: Vec<String>,
    pub transitions: Vec<StateTransition>,
    pub initial_state: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("state '{0}' referenced by a transition is not declared")]
    UndeclaredState(String),

    #[error("initial state '{0}' is not declared")]
    UndeclaredInitialState(String),

    #[error("duplicate transition from '{from_state}' on trigger '{trigger}'")]
    AmbiguousTransition { from_state: String, trigger: String },
}

impl StateMachine {
    pub fn new(
        entity: impl Into<String>,
        states: Vec<String>,
        transitions: Vec<StateTransition>,
        initial_state: impl Into<String>,
    ) -> Result<Self, StateMachineError> {
        let entity = entity.into();
        let initial_state = initial_state.into();

        if !states.contains(&initial_state) {
            return Err(StateMachineError::UndeclaredInitialState(initial_state));
        }
        for t in &transitions {
            if !states.contains(&t.from_state) {
                return Err(StateMachineError::UndeclaredState(t.from_state.clone()));
            }
            if !states.contains(&t.to_state) {
                return Err(StateMachineError::UndeclaredState(t.to_state.clone()));
            }
        }
        for (i, t) in transitions.iter().enumerate() {
            let dup = transitions[..i]
                .iter()
                .any(|p| p.from_state == t.from_state && p.trigger == t.trigger);
            if dup {
                return Err(StateMachineError::AmbiguousTransition {
                    from_state: t.from_state.clone(),
                    trigger: t.trigger.clone(),
                });
            }
        }

        Ok(Self {
            entity,
            states,
            transitions,
            initial_state,
        })
    }

    /// Transition with matching endpoints, preferring one whose trigger is
    /// `trigger`; falls back to any transition with the same endpoints.
    pub fn find_transition(
        &self,
        from_state: &str,
        to_state: &str,
        trigger: &str,
    ) -> Option<&StateTransition> {
        self.transitions
            .iter()
            .find(|t| {
                t.from_state == from_state && t.to_state == to_state && t.trigger == trigger
            })
            .or_else(|| {
                self.transitions
                    .iter()
                    .find(|t| t.from_state == from_state && t.to_state == to_state)
            })
    }

    /// Target states reachable from `from_state`, sorted and deduplicated.
    pub fn reachable_from(&self, from_state: &str) -> Vec<String> {
        let mut targets: Vec<String> = self
            .transitions
            .iter()
            .filter(|t| t.from_state == from_state)
            .map(|t| t.to_state.clone())
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Structural equality used to detect conflicting re-registration.
    pub fn same_topology(&self, other: &StateMachine) -> bool {
        self.states == other.states
            && self.transitions == other.transitions
            && self.initial_state == other.initial_state
    }
}
