use thiserror::Error;

/// Unified error surface for the gateway core.
///
/// Every externally visible failure carries a machine-readable kind and a
/// human-readable message. Handler internals never leak through this type.
#[derive(Debug, Error)]
pub enum OagError {
    #[error("validation failed: {0}")]
    Validation(ValidationError),

    #[error("permission denied: role '{role}' may not invoke '{action}'")]
    PermissionDenied { action: String, role: String },

    #[error("guard rejected '{action}' on {entity}: {} violation(s)", .violations.len())]
    GuardViolation {
        entity: String,
        action: String,
        violations: Vec<Violation>,
        suggestions: Vec<String>,
    },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unresolved path '{path}' at segment '{segment}' on entity {entity}")]
    UnresolvedPath {
        path: String,
        segment: String,
        entity: String,
        suggestion: Option<String>,
    },

    #[error("invalid filter value for '{path}': operator {operator} requires {expected}")]
    InvalidFilterValue {
        path: String,
        operator: String,
        expected: String,
    },

    #[error("{kind} '{name}' is already registered")]
    AlreadyRegistered { kind: &'static str, name: String },

    #[error("conflicting state machine for entity {0}")]
    ConflictingStateMachine(String),

    #[error("dispatch failed for '{action}': {message}")]
    Dispatch { action: String, message: String },

    #[error("plan contains a dependency cycle involving step '{0}'")]
    CyclicPlan(String),

    #[error("plan {plan_id} failed at step '{failed_step}' (rollback: {})",
            .rollback_status.as_deref().unwrap_or("not attempted"))]
    PlanExecutionFailed {
        plan_id: String,
        failed_step: String,
        error: String,
        rollback_status: Option<String>,
    },

    #[error("sandbox error in constraint '{constraint_id}': {message}")]
    Sandbox {
        constraint_id: String,
        message: String,
    },

    #[error("internal: {0}")]
    Internal(String),
}

impl OagError {
    /// Stable machine-readable discriminant for API surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::GuardViolation { .. } => "guard_violation",
            Self::UnknownAction(_) => "unknown_action",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::UnresolvedPath { .. } => "unresolved_path",
            Self::InvalidFilterValue { .. } => "invalid_filter_value",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::ConflictingStateMachine(_) => "conflicting_state_machine",
            Self::Dispatch { .. } => "dispatch_error",
            Self::CyclicPlan(_) => "cyclic_plan",
            Self::PlanExecutionFailed { .. } => "plan_execution_failed",
            Self::Sandbox { .. } => "sandbox_error",
            Self::Internal(_) => "internal",
        }
    }
}

/// Parameter validation failure with per-field detail.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// A single failed guard check.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Violation {
    pub constraint_id: String,
    pub constraint_name: String,
    pub message: String,
    pub severity: Severity,
    /// Populated for state-machine violations: reachable target states.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_alternatives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.constraint_id, self.severity, self.message
        )
    }
}

pub type Result<T> = std::result::Result<T, OagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(OagError::UnknownAction("x".into()).kind(), "unknown_action");
        assert_eq!(
            OagError::AlreadyRegistered {
                kind: "action",
                name: "x".into()
            }
            .kind(),
            "already_registered"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let mut err = ValidationError::default();
        err.push("phone", "required");
        err.push("amount", "must be a number");
        let text = err.to_string();
        assert!(text.contains("phone: required"));
        assert!(text.contains("amount: must be a number"));
    }

    #[test]
    fn test_violation_display() {
        let v = Violation {
            constraint_id: "room_vacant".into(),
            constraint_name: "Room must be vacant".into(),
            message: "Room not vacant".into(),
            severity: Severity::Error,
            valid_alternatives: vec![],
        };
        assert_eq!(v.to_string(), "[room_vacant] ERROR: Room not vacant");
    }
}
