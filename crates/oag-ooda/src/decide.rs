//! Decide phase — turns an orientation into a decision via a rule chain.
//!
//! Rules are consulted newest-first; the registry-backed rule is the
//! default fallback, reading required parameters, risk level and the
//! financial flag from the action's registered metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use oag_core::{OntologyRegistry, RiskLevel};

use crate::orient::Orientation;

/// A parameter the caller still has to supply. This is the follow-up
/// prompt shape clients render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingField {
    pub field_name: String,
    pub display_name: String,
    pub field_type: String,
    pub required: bool,
}

impl MissingField {
    fn for_param(name: &str) -> Self {
        Self {
            field_name: name.to_string(),
            display_name: title_case(name),
            field_type: "string".into(),
            required: true,
        }
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Output of the decide phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action_type: String,
    #[serde(default)]
    pub action_params: Map<String, Value>,
    pub requires_confirmation: bool,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<MissingField>,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    fn invalid(action_type: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            action_type: action_type.into(),
            action_params: Map::new(),
            requires_confirmation: false,
            confidence: 0.0,
            missing_fields: Vec::new(),
            is_valid: false,
            errors,
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }
}

pub trait DecisionRule: Send + Sync {
    fn can_handle(&self, orientation: &Orientation) -> bool;
    fn evaluate(&self, orientation: &Orientation) -> Option<Decision>;
}

/// Shared decision assembly used by both rule kinds.
fn build_decision(
    intent: &crate::orient::IntentResult,
    action_type: &str,
    required_params: &[String],
    high_risk: bool,
    is_financial: bool,
) -> Decision {
    let action_params = intent.entities.clone();

    let missing_fields: Vec<MissingField> = required_params
        .iter()
        .filter(|param| {
            !action_params
                .get(*param)
                .map(|value| !value.is_null())
                .unwrap_or(false)
        })
        .map(|param| MissingField::for_param(param))
        .collect();

    let requires_confirmation = high_risk
        || is_financial
        || intent.requires_confirmation
        || !missing_fields.is_empty();

    let completeness = if required_params.is_empty() {
        1.0
    } else {
        let provided = required_params.len() - missing_fields.len();
        provided as f64 / required_params.len().max(1) as f64
    };
    let confidence = intent.confidence * completeness;

    Decision {
        action_type: action_type.to_string(),
        action_params,
        requires_confirmation,
        confidence,
        is_valid: missing_fields.is_empty(),
        missing_fields,
        errors: Vec::new(),
        metadata: Map::new(),
        timestamp: Utc::now(),
    }
}

/// Explicit rule for one action with a fixed required-parameter list.
pub struct IntentRule {
    action_type: String,
    required_params: Vec<String>,
    high_risk: bool,
    is_financial: bool,
}

impl IntentRule {
    pub fn new<I, S>(action_type: impl Into<String>, required_params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action_type: action_type.into(),
            required_params: required_params.into_iter().map(Into::into).collect(),
            high_risk: false,
            is_financial: false,
        }
    }

    pub fn high_risk(mut self) -> Self {
        self.high_risk = true;
        self
    }

    pub fn financial(mut self) -> Self {
        self.is_financial = true;
        self
    }
}

impl DecisionRule for IntentRule {
    fn can_handle(&self, orientation: &Orientation) -> bool {
        orientation
            .intent
            .as_ref()
            .map(|intent| intent.action_type == self.action_type)
            .unwrap_or(false)
    }

    fn evaluate(&self, orientation: &Orientation) -> Option<Decision> {
        if !self.can_handle(orientation) {
            return None;
        }
        let intent = orientation.intent.as_ref()?;
        Some(build_decision(
            intent,
            &self.action_type,
            &self.required_params,
            self.high_risk,
            self.is_financial,
        ))
    }
}

/// Fallback rule reading `ui_required_fields`, `risk_level` and
/// `is_financial` from the registry for whatever action the intent names.
pub struct RegistryRule {
    registry: Arc<OntologyRegistry>,
}

impl RegistryRule {
    pub fn new(registry: Arc<OntologyRegistry>) -> Self {
        Self { registry }
    }
}

impl DecisionRule for RegistryRule {
    fn can_handle(&self, orientation: &Orientation) -> bool {
        orientation.intent.is_some()
    }

    fn evaluate(&self, orientation: &Orientation) -> Option<Decision> {
        let intent = orientation.intent.as_ref()?;
        let (required, high_risk, is_financial) =
            match self.registry.get_action_by_name(&intent.action_type) {
                Some(spec) => (
                    spec.ui_required_fields.clone(),
                    spec.risk_level >= RiskLevel::High,
                    spec.is_financial,
                ),
                // Unregistered action: nothing to require, nothing to flag.
                None => (Vec::new(), false, false),
            };
        Some(build_decision(
            intent,
            &intent.action_type,
            &required,
            high_risk,
            is_financial,
        ))
    }
}

/// The decide phase: a rule chain with the registry rule as fallback.
pub struct DecidePhase {
    rules: Vec<Box<dyn DecisionRule>>,
}

impl DecidePhase {
    pub fn new(registry: Arc<OntologyRegistry>) -> Self {
        Self {
            rules: vec![Box::new(RegistryRule::new(registry))],
        }
    }

    /// Newest rule is consulted first.
    pub fn add_rule(&mut self, rule: Box<dyn DecisionRule>) {
        self.rules.insert(0, rule);
    }

    pub fn decide(&self, orientation: &Orientation) -> Decision {
        let mut errors = Vec::new();

        if !orientation.is_valid {
            errors.extend(orientation.errors.iter().cloned());
        }
        if orientation.intent.is_none() {
            errors.push("no intent recognized".into());
        }

        let mut decision = if errors.is_empty() {
            self.rules
                .iter()
                .find(|rule| rule.can_handle(orientation))
                .and_then(|rule| rule.evaluate(orientation))
                .unwrap_or_else(|| {
                    Decision::invalid("unknown", vec!["No decision rule matched".into()])
                })
        } else {
            errors.push("No decision rule matched".into());
            Decision::invalid("unknown", errors)
        };

        for key in ["user_id", "role"] {
            if let Some(value) = orientation.context.get(key) {
                decision.metadata.insert(key.to_string(), value.clone());
            }
        }

        debug!(
            action = %decision.action_type,
            valid = decision.is_valid,
            missing = decision.missing_fields.len(),
            "decision evaluated"
        );
        info!(
            action = %decision.action_type,
            confidence = decision.confidence,
            requires_confirmation = decision.requires_confirmation,
            "decide phase completed"
        );
        decision
    }
}
