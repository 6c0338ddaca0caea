//! Declarative constraints evaluated by the guard before dispatch.

use serde::{Deserialize, Serialize};

pub use crate::error::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConstraintType {
    State,
    BusinessRule,
    Property,
    Uniqueness,
}

/// Action name that matches every action of the entity.
pub const WILDCARD_ACTION: &str = "*";

/// A named boolean condition over `state`, `param` and `user`.
///
/// `condition_code` is evaluated in the expression sandbox; constraints
/// without code are declarative-only and skipped by the guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub constraint_type: ConstraintType,
    pub severity: Severity,
    pub entity: String,
    /// Action name, or `*` to apply to every action of the entity.
    pub action: String,
    /// Human-readable condition, for export and prompts.
    #[serde(default)]
    pub condition_text: String,
    /// Sandboxed boolean expression, e.g. `state.status == 'VACANT_CLEAN'`.
    #[serde(default)]
    pub condition_code: Option<String>,
    pub error_message: String,
    #[serde(default)]
    pub suggestion_message: Option<String>,
}

impl ConstraintMetadata {
    pub fn applies_to(&self, entity: &str, action: &str) -> bool {
        self.entity == entity && (self.action == action || self.action == WILDCARD_ACTION)
    }

    pub fn is_wildcard(&self) -> bool {
        self.action == WILDCARD_ACTION
    }
}
