//! Action metadata — the declarative half of an action registration.
//!
//! The callable half (handler + parameter model) lives in the action
//! registry crate; the ontology registry only holds this schema.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// Mutation vs query. Query actions skip the guard gate at dispatch time
/// but remain subject to the role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Mutation,
    Query,
}

/// Risk level driving human-in-the-loop confirmation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A correct/incorrect extraction pair used to teach extractors the
/// difference between a semantic signal and a parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryExample {
    pub correct: String,
    pub incorrect: String,
}

/// Declarative metadata for one action, unique by `name` across the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    /// Owning entity name; must be registered before the action.
    pub entity: String,
    pub category: ActionCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub undoable: bool,
    /// Empty set denies every caller.
    #[serde(default)]
    pub allowed_roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_effects: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub semantic_category: Option<String>,
    /// Meaning of the semantic category, supplied by the domain layer.
    #[serde(default)]
    pub category_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub glossary_examples: Vec<GlossaryExample>,
    /// Parameters that must be present before dispatch, in prompt order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ui_required_fields: Vec<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub is_financial: bool,
}

impl ActionSpec {
    pub fn new(
        name: impl Into<String>,
        entity: impl Into<String>,
        category: ActionCategory,
    ) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            category,
            description: String::new(),
            requires_confirmation: false,
            undoable: false,
            allowed_roles: BTreeSet::new(),
            side_effects: Vec::new(),
            search_keywords: Vec::new(),
            semantic_category: None,
            category_description: None,
            glossary_examples: Vec::new(),
            ui_required_fields: Vec::new(),
            risk_level: RiskLevel::None,
            is_financial: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ui_required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_semantic_category(mut self, category: impl Into<String>) -> Self {
        self.semantic_category = Some(category.into());
        self
    }

    pub fn with_category_description(mut self, description: impl Into<String>) -> Self {
        self.category_description = Some(description.into());
        self
    }

    pub fn with_glossary_examples(mut self, examples: Vec<GlossaryExample>) -> Self {
        self.glossary_examples = examples;
        self
    }

    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn financial(mut self) -> Self {
        self.is_financial = true;
        self
    }

    pub fn undoable(mut self) -> Self {
        self.undoable = true;
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn allows_role(&self, role: &str) -> bool {
        self.allowed_roles.contains(role)
    }

    pub fn is_mutation(&self) -> bool {
        self.category == ActionCategory::Mutation
    }
}
