//! Guard executor — the unified pre-dispatch gate.
//!
//! Given `(entity, action, params, context)` the guard answers "may this
//! proceed?" by checking state-machine legality first, then every
//! applicable constraint. A state-machine failure or any ERROR-severity
//! constraint short-circuits; WARNING constraints are recorded and never
//! block.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use oag_core::{OntologyRegistry, Severity, Violation};
use oag_expr::{parse_expression, evaluate_predicate, Scope};

/// Evaluation context for one guard check. All fields are optional — the
/// guard checks whatever evidence the caller can supply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardContext {
    /// Read-only view of the entity as it exists now.
    #[serde(default)]
    pub entity_state: Option<Value>,
    #[serde(default)]
    pub current_state: Option<String>,
    #[serde(default)]
    pub target_state: Option<String>,
    /// Caller identity as a JSON object (at least `role`, usually `user_id`).
    #[serde(default)]
    pub user_context: Option<Value>,
}

impl GuardContext {
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

    pub fn with_user(mut self, user_context: Value) -> Self {
        self.user_context = Some(user_context);
        self
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardResult {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl GuardResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// The guard itself. Stateless apart from the registry reference; safe to
/// share across request workers.
pub struct GuardExecutor<'r> {
    registry: &'r OntologyRegistry,
}

impl<'r> GuardExecutor<'r> {
    pub fn new(registry: &'r OntologyRegistry) -> Self {
        Self { registry }
    }

    /// Run the full gate: state-machine legality, then constraints.
    pub fn check(
        &self,
        entity: &str,
        action: &str,
        params: &Value,
        context: &GuardContext,
    ) -> GuardResult {
        if let Some(violation) = self.check_state_machine(entity, action, context) {
            // State-machine failure short-circuits — constraints are not
            // evaluated at all.
            let mut result = GuardResult {
                allowed: false,
                violations: vec![violation],
                ..GuardResult::default()
            };
            result.suggestions = result
                .violations
                .iter()
                .flat_map(|v| {
                    v.valid_alternatives
                        .iter()
                        .map(|alt| format!("valid target state: {alt}"))
                })
                .collect();
            return result;
        }

        self.check_constraints(entity, action, params, context)
    }

    /// State-machine legality. `None` means "no objection" — either both
    /// endpoint states were supplied and legal, or there was nothing to
    /// check.
    fn check_state_machine(
        &self,
        entity: &str,
        action: &str,
        context: &GuardContext,
    ) -> Option<Violation> {
        let (current, target) = match (&context.current_state, &context.target_state) {
            (Some(c), Some(t)) => (c, t),
            _ => return None,
        };
        let machine = self.registry.get_state_machine(entity)?;

        if machine.find_transition(current, target, action).is_some() {
            debug!(entity, action, current, target, "state transition allowed");
            return None;
        }

        let alternatives = machine.reachable_from(current);
        Some(Violation {
            constraint_id: format!("state_machine_{entity}"),
            constraint_name: format!("{entity} state machine"),
            message: format!(
                "no transition from '{current}' to '{target}' is declared for {entity}"
            ),
            severity: Severity::Error,
            valid_alternatives: alternatives,
        })
    }

    fn check_constraints(
        &self,
        entity: &str,
        action: &str,
        params: &Value,
        context: &GuardContext,
    ) -> GuardResult {
        let constraints = self.registry.get_constraints(entity, action);
        let mut result = GuardResult::allow();

        let empty = Value::Object(serde_json::Map::new());
        let state = context.entity_state.as_ref().unwrap_or(&empty);
        let user = context.user_context.as_ref().unwrap_or(&empty);
        let scope = Scope::new(state, params, user);

        for constraint in &constraints {
            let code = match constraint.condition_code.as_deref() {
                Some(code) if !code.is_empty() => code,
                // Declarative-only constraints are informational.
                _ => continue,
            };

            let passed = match parse_expression(code)
                .and_then(|expr| evaluate_predicate(&expr, &scope))
            {
                Ok(passed) => passed,
                Err(err) => {
                    // Sandbox failures count as a failed check, never a crash.
                    warn!(
                        constraint = %constraint.id,
                        error = %err,
                        "constraint evaluation failed"
                    );
                    self.record_failure(
                        &mut result,
                        constraint,
                        format!("constraint '{}' could not be evaluated: {err}", constraint.id),
                    );
                    if constraint.severity == Severity::Error {
                        break;
                    }
                    continue;
                }
            };

            if passed {
                continue;
            }

            self.record_failure(&mut result, constraint, constraint.error_message.clone());
            if constraint.severity == Severity::Error {
                // First ERROR short-circuits the remaining constraints.
                break;
            }
        }

        result.allowed = result.violations.is_empty();
        result
    }

    fn record_failure(
        &self,
        result: &mut GuardResult,
        constraint: &oag_core::ConstraintMetadata,
        message: String,
    ) {
        let violation = Violation {
            constraint_id: constraint.id.clone(),
            constraint_name: constraint.name.clone(),
            message,
            severity: constraint.severity,
            valid_alternatives: Vec::new(),
        };
        if let Some(suggestion) = &constraint.suggestion_message {
            result.suggestions.push(suggestion.clone());
        }
        match constraint.severity {
            Severity::Error => result.violations.push(violation),
            Severity::Warning => result.warnings.push(violation),
        }
    }
}
