//! Human-in-the-loop confirmation strategies.
//!
//! Each strategy answers "does this action, with these parameters, in this
//! user's hands, require confirmation?". Domain knowledge — which actions
//! are financial, which are high-risk, confirmation policy buckets — comes
//! from registry metadata or constructor arguments, never from the core.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use oag_core::{ActionSpec, RiskLevel};

pub trait HitlStrategy: Send + Sync {
    fn requires_confirmation(
        &self,
        action: &ActionSpec,
        params: &Map<String, Value>,
        user_role: &str,
    ) -> bool;

    fn risk_level(&self, action: &ActionSpec, params: &Map<String, Value>) -> RiskLevel;
}

// ── ConfirmAlways ────────────────────────────────────────────────

/// Every action needs confirmation. The most conservative stance.
pub struct ConfirmAlways;

impl HitlStrategy for ConfirmAlways {
    fn requires_confirmation(&self, _: &ActionSpec, _: &Map<String, Value>, _: &str) -> bool {
        true
    }

    fn risk_level(&self, _: &ActionSpec, _: &Map<String, Value>) -> RiskLevel {
        RiskLevel::Medium
    }
}

// ── ConfirmByRisk ────────────────────────────────────────────────

/// Rule that may override the computed risk for specific situations
/// (e.g. escalate a bill adjustment above some amount to critical).
pub type RiskRule = Arc<dyn Fn(&ActionSpec, &Map<String, Value>) -> Option<RiskLevel> + Send + Sync>;

/// Risk comes from the registry's `risk_level`, optionally overridden by a
/// per-action map or injected custom rules. MEDIUM and above confirm.
#[derive(Default)]
pub struct ConfirmByRisk {
    overrides: HashMap<String, RiskLevel>,
    custom_rules: Vec<RiskRule>,
}

impl ConfirmByRisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, RiskLevel>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_rule(mut self, rule: RiskRule) -> Self {
        self.custom_rules.push(rule);
        self
    }
}

impl HitlStrategy for ConfirmByRisk {
    fn requires_confirmation(
        &self,
        action: &ActionSpec,
        params: &Map<String, Value>,
        _: &str,
    ) -> bool {
        self.risk_level(action, params) >= RiskLevel::Medium
    }

    fn risk_level(&self, action: &ActionSpec, params: &Map<String, Value>) -> RiskLevel {
        for rule in &self.custom_rules {
            if let Some(risk) = rule(action, params) {
                return risk;
            }
        }
        if let Some(risk) = self.overrides.get(&action.name) {
            return *risk;
        }
        action.risk_level
    }
}

// ── ConfirmByPolicy ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyBucket {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub confirm: bool,
    #[serde(default)]
    pub require_reason: bool,
}

/// Confirmation policies: three action buckets plus per-role exemptions.
/// Unbucketed actions confirm by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmPolicies {
    #[serde(default)]
    pub high_risk_actions: PolicyBucket,
    #[serde(default)]
    pub medium_risk_actions: PolicyBucket,
    #[serde(default)]
    pub low_risk_actions: PolicyBucket,
    /// role -> action names exempt from confirmation.
    #[serde(default)]
    pub skip_confirmation: HashMap<String, Vec<String>>,
}

pub struct ConfirmByPolicy {
    policies: ConfirmPolicies,
}

enum Bucket {
    High,
    Medium,
    Low,
}

impl ConfirmByPolicy {
    pub fn new(policies: ConfirmPolicies) -> Self {
        Self { policies }
    }

    fn bucket_of(&self, action_name: &str) -> Option<Bucket> {
        if self
            .policies
            .high_risk_actions
            .actions
            .iter()
            .any(|a| a == action_name)
        {
            return Some(Bucket::High);
        }
        if self
            .policies
            .medium_risk_actions
            .actions
            .iter()
            .any(|a| a == action_name)
        {
            return Some(Bucket::Medium);
        }
        if self
            .policies
            .low_risk_actions
            .actions
            .iter()
            .any(|a| a == action_name)
        {
            return Some(Bucket::Low);
        }
        None
    }

    fn role_exempt(&self, action_name: &str, user_role: &str) -> bool {
        self.policies
            .skip_confirmation
            .get(user_role)
            .map(|actions| actions.iter().any(|a| a == action_name))
            .unwrap_or(false)
    }

    pub fn requires_reason(&self, action_name: &str) -> bool {
        match self.bucket_of(action_name) {
            Some(Bucket::High) => self.policies.high_risk_actions.require_reason,
            Some(Bucket::Medium) => self.policies.medium_risk_actions.require_reason,
            Some(Bucket::Low) => self.policies.low_risk_actions.require_reason,
            None => false,
        }
    }
}

impl HitlStrategy for ConfirmByPolicy {
    fn requires_confirmation(
        &self,
        action: &ActionSpec,
        _: &Map<String, Value>,
        user_role: &str,
    ) -> bool {
        if self.role_exempt(&action.name, user_role) {
            return false;
        }
        match self.bucket_of(&action.name) {
            Some(Bucket::High) => self.policies.high_risk_actions.confirm,
            Some(Bucket::Medium) => self.policies.medium_risk_actions.confirm,
            Some(Bucket::Low) => self.policies.low_risk_actions.confirm,
            // Unbucketed actions confirm by default.
            None => true,
        }
    }

    fn risk_level(&self, action: &ActionSpec, _: &Map<String, Value>) -> RiskLevel {
        match self.bucket_of(&action.name) {
            Some(Bucket::High) => RiskLevel::Critical,
            Some(Bucket::Medium) => RiskLevel::High,
            Some(Bucket::Low) => RiskLevel::Low,
            None => RiskLevel::Medium,
        }
    }
}

// ── ConfirmByThreshold ───────────────────────────────────────────

/// Parameter-value thresholds for financial and batch operations.
/// `is_financial` comes from the registry.
pub struct ConfirmByThreshold {
    pub payment_threshold: f64,
    pub adjustment_threshold: f64,
    pub quantity_threshold: usize,
}

impl Default for ConfirmByThreshold {
    fn default() -> Self {
        Self {
            payment_threshold: 1000.0,
            adjustment_threshold: 500.0,
            quantity_threshold: 10,
        }
    }
}

const BATCH_PARAM_KEYS: &[&str] = &["ids", "room_ids", "task_ids"];

impl ConfirmByThreshold {
    fn triggered(&self, action: &ActionSpec, params: &Map<String, Value>) -> bool {
        if action.is_financial {
            if let Some(amount) = params.get("amount").and_then(Value::as_f64) {
                if amount >= self.payment_threshold {
                    return true;
                }
            }
            if let Some(adjustment) = params.get("adjustment_amount").and_then(Value::as_f64) {
                if adjustment.abs() >= self.adjustment_threshold {
                    return true;
                }
            }
        }
        for key in BATCH_PARAM_KEYS {
            if let Some(Value::Array(items)) = params.get(*key) {
                if items.len() >= self.quantity_threshold {
                    return true;
                }
            }
        }
        false
    }
}

impl HitlStrategy for ConfirmByThreshold {
    fn requires_confirmation(
        &self,
        action: &ActionSpec,
        params: &Map<String, Value>,
        _: &str,
    ) -> bool {
        self.triggered(action, params)
    }

    fn risk_level(&self, action: &ActionSpec, params: &Map<String, Value>) -> RiskLevel {
        if self.triggered(action, params) {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

// ── Composite ────────────────────────────────────────────────────

/// Logical OR over child strategies; risk is the maximum across children.
pub struct Composite {
    children: Vec<Arc<dyn HitlStrategy>>,
}

impl Composite {
    pub fn new(children: Vec<Arc<dyn HitlStrategy>>) -> Self {
        Self { children }
    }
}

impl HitlStrategy for Composite {
    fn requires_confirmation(
        &self,
        action: &ActionSpec,
        params: &Map<String, Value>,
        user_role: &str,
    ) -> bool {
        self.children
            .iter()
            .any(|child| child.requires_confirmation(action, params, user_role))
    }

    fn risk_level(&self, action: &ActionSpec, params: &Map<String, Value>) -> RiskLevel {
        self.children
            .iter()
            .map(|child| child.risk_level(action, params))
            .max()
            .unwrap_or(RiskLevel::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oag_core::ActionCategory;
    use serde_json::json;

    fn action(name: &str, risk: RiskLevel, financial: bool) -> ActionSpec {
        let mut spec = ActionSpec::new(name, "Bill", ActionCategory::Mutation).with_risk(risk);
        if financial {
            spec = spec.financial();
        }
        spec
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_confirm_always() {
        let strategy = ConfirmAlways;
        let spec = action("anything", RiskLevel::None, false);
        assert!(strategy.requires_confirmation(&spec, &Map::new(), "manager"));
        assert_eq!(strategy.risk_level(&spec, &Map::new()), RiskLevel::Medium);
    }

    #[test]
    fn test_confirm_by_risk_uses_registry_metadata() {
        let strategy = ConfirmByRisk::new();
        assert!(!strategy.requires_confirmation(
            &action("start_task", RiskLevel::Low, false),
            &Map::new(),
            "staff"
        ));
        assert!(strategy.requires_confirmation(
            &action("checkout", RiskLevel::Medium, false),
            &Map::new(),
            "staff"
        ));
        assert!(strategy.requires_confirmation(
            &action("adjust_bill", RiskLevel::Critical, true),
            &Map::new(),
            "manager"
        ));
    }

    #[test]
    fn test_confirm_by_risk_override_map() {
        let strategy = ConfirmByRisk::new().with_overrides(HashMap::from([(
            "start_task".to_string(),
            RiskLevel::High,
        )]));
        assert!(strategy.requires_confirmation(
            &action("start_task", RiskLevel::Low, false),
            &Map::new(),
            "staff"
        ));
    }

    #[test]
    fn test_confirm_by_risk_custom_rule() {
        let strategy = ConfirmByRisk::new().with_rule(Arc::new(|spec, params| {
            if spec.is_financial {
                let amount = params
                    .get("adjustment_amount")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                if amount.abs() > 1000.0 {
                    return Some(RiskLevel::Critical);
                }
            }
            None
        }));

        let spec = action("adjust_bill", RiskLevel::Medium, true);
        assert_eq!(
            strategy.risk_level(&spec, &params(json!({"adjustment_amount": -1500}))),
            RiskLevel::Critical
        );
        assert_eq!(
            strategy.risk_level(&spec, &params(json!({"adjustment_amount": 10}))),
            RiskLevel::Medium
        );
    }

    fn sample_policies() -> ConfirmPolicies {
        ConfirmPolicies {
            high_risk_actions: PolicyBucket {
                actions: vec!["adjust_bill".into(), "delete_guest".into()],
                confirm: true,
                require_reason: true,
            },
            medium_risk_actions: PolicyBucket {
                actions: vec!["change_room".into(), "extend_stay".into()],
                confirm: true,
                require_reason: false,
            },
            low_risk_actions: PolicyBucket {
                actions: vec!["create_task".into()],
                confirm: false,
                require_reason: false,
            },
            skip_confirmation: HashMap::from([(
                "manager".to_string(),
                vec!["adjust_bill".to_string()],
            )]),
        }
    }

    #[test]
    fn test_policy_buckets() {
        let strategy = ConfirmByPolicy::new(sample_policies());
        let high = action("adjust_bill", RiskLevel::None, true);
        let low = action("create_task", RiskLevel::None, false);
        let unknown = action("mystery", RiskLevel::None, false);

        assert!(strategy.requires_confirmation(&high, &Map::new(), "receptionist"));
        assert!(!strategy.requires_confirmation(&low, &Map::new(), "receptionist"));
        // Unbucketed actions confirm by default.
        assert!(strategy.requires_confirmation(&unknown, &Map::new(), "receptionist"));
        assert!(strategy.requires_reason("adjust_bill"));
        assert!(!strategy.requires_reason("change_room"));
    }

    #[test]
    fn test_policy_role_exemption() {
        let strategy = ConfirmByPolicy::new(sample_policies());
        let high = action("adjust_bill", RiskLevel::None, true);
        assert!(!strategy.requires_confirmation(&high, &Map::new(), "manager"));
        assert!(strategy.requires_confirmation(&high, &Map::new(), "receptionist"));
    }

    #[test]
    fn test_threshold_financial_amounts() {
        let strategy = ConfirmByThreshold::default();
        let payment = action("add_payment", RiskLevel::None, true);

        assert!(strategy.requires_confirmation(
            &payment,
            &params(json!({"amount": 1500.0})),
            "staff"
        ));
        assert!(!strategy.requires_confirmation(
            &payment,
            &params(json!({"amount": 200.0})),
            "staff"
        ));
        // Non-financial actions ignore amounts entirely.
        let chore = action("create_task", RiskLevel::None, false);
        assert!(!strategy.requires_confirmation(
            &chore,
            &params(json!({"amount": 99999.0})),
            "staff"
        ));
    }

    #[test]
    fn test_threshold_batch_size() {
        let strategy = ConfirmByThreshold::default();
        let batch = action("create_task", RiskLevel::None, false);
        let ids: Vec<i64> = (0..12).collect();
        assert!(strategy.requires_confirmation(
            &batch,
            &params(json!({"room_ids": ids})),
            "staff"
        ));
        assert!(!strategy.requires_confirmation(
            &batch,
            &params(json!({"room_ids": [1, 2]})),
            "staff"
        ));
    }

    #[test]
    fn test_composite_or_and_max_risk() {
        let composite = Composite::new(vec![
            Arc::new(ConfirmByRisk::new()),
            Arc::new(ConfirmByThreshold::default()),
        ]);
        let spec = action("add_payment", RiskLevel::Low, true);

        // Low registry risk alone would not confirm, but the threshold fires.
        let big = params(json!({"amount": 5000.0}));
        assert!(composite.requires_confirmation(&spec, &big, "staff"));
        assert_eq!(composite.risk_level(&spec, &big), RiskLevel::High);

        let small = params(json!({"amount": 5.0}));
        assert!(!composite.requires_confirmation(&spec, &small, "staff"));
    }
}
