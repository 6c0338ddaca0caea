//! Dispatch pipeline: lookup → role check → parameter validation → guard
//! gate → handler invocation.
//!
//! The guard is consulted for every mutation and never bypassed; query
//! actions skip the guard but not the role check. Handler results are
//! forwarded unchanged; unexpected handler errors wrap into a dispatch
//! error without leaking internals.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use oag_core::{OagError, OntologyRegistry, Result};
use oag_guard::{GuardContext, GuardExecutor};

use crate::context::HandlerContext;
use crate::handler::ActionOutcome;
use crate::registry::ActionRegistry;

/// Per-call dispatch input beyond the raw parameters.
#[derive(Clone)]
pub struct DispatchContext {
    pub handler_ctx: HandlerContext,
    /// Current persisted state of the target entity, when the caller has it.
    pub entity_state: Option<Value>,
    /// State-machine endpoints for transition checking.
    pub current_state: Option<String>,
    pub target_state: Option<String>,
}

impl DispatchContext {
    pub fn new(handler_ctx: HandlerContext) -> Self {
        Self {
            handler_ctx,
            entity_state: None,
            current_state: None,
            target_state: None,
        }
    }

    pub fn with_entity_state(mut self, entity_state: Value) -> Self {
        self.entity_state = Some(entity_state);
        self
    }

    pub fn with_transition(
        mut self,
        current_state: impl Into<String>,
        target_state: impl Into<String>,
    ) -> Self {
        self.current_state = Some(current_state.into());
        self.target_state = Some(target_state.into());
        self
    }
}

/// Resolves actions by name and runs the dispatch pipeline.
pub struct ActionDispatcher {
    ontology: Arc<OntologyRegistry>,
    actions: Arc<ActionRegistry>,
}

impl ActionDispatcher {
    pub fn new(ontology: Arc<OntologyRegistry>, actions: Arc<ActionRegistry>) -> Self {
        Self { ontology, actions }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    #[instrument(skip(self, raw_params, ctx), fields(action = %action_name))]
    pub async fn dispatch(
        &self,
        action_name: &str,
        raw_params: &Value,
        ctx: DispatchContext,
    ) -> Result<ActionOutcome> {
        let action = self
            .actions
            .get(action_name)
            .ok_or_else(|| OagError::UnknownAction(action_name.to_string()))?;

        // Role check. An empty allowed set denies everyone.
        let role = ctx.handler_ctx.user.role.clone();
        if !action.spec.allows_role(&role) {
            debug!(%role, "role rejected");
            return Err(OagError::PermissionDenied {
                action: action_name.to_string(),
                role,
            });
        }

        // Parameter model validation.
        let validated = action
            .params_model
            .validate(raw_params)
            .map_err(OagError::Validation)?;

        // Guard gate — mutations only.
        if action.spec.is_mutation() {
            let guard = GuardExecutor::new(&self.ontology);
            let guard_ctx = GuardContext {
                entity_state: ctx.entity_state.clone(),
                current_state: ctx.current_state.clone(),
                target_state: ctx.target_state.clone(),
                user_context: Some(json!({
                    "user_id": ctx.handler_ctx.user.user_id,
                    "role": ctx.handler_ctx.user.role,
                })),
            };
            let verdict = guard.check(
                &action.spec.entity,
                action_name,
                &validated.as_value(),
                &guard_ctx,
            );
            for warning in &verdict.warnings {
                warn!(constraint = %warning.constraint_id, "guard warning: {}", warning.message);
            }
            if !verdict.allowed {
                return Err(OagError::GuardViolation {
                    entity: action.spec.entity.clone(),
                    action: action_name.to_string(),
                    violations: verdict.violations,
                    suggestions: verdict.suggestions,
                });
            }
        }

        // Handler invocation. The outcome dictionary is forwarded verbatim.
        match action.handler.execute(validated, &ctx.handler_ctx).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(error = %err, "handler returned an unexpected error");
                Err(OagError::Dispatch {
                    action: action_name.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }
}
