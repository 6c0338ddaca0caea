//! Layered runtime configuration.
//!
//! Maps directly to a YAML document carrying HITL policy buckets,
//! threshold values and retrieval settings. Resolution order: explicit
//! path, `OAG_CONFIG` env var, `oag.yaml` in the working directory,
//! built-in defaults.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use oag_actions::{
    Composite, ConfirmByPolicy, ConfirmByRisk, ConfirmByThreshold, ConfirmPolicies, HitlStrategy,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OagConfig {
    #[serde(default)]
    pub hitl: HitlConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitlConfig {
    #[serde(default)]
    pub policies: ConfirmPolicies,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub payment_threshold: f64,
    pub adjustment_threshold: f64,
    pub quantity_threshold: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            payment_threshold: 1000.0,
            adjustment_threshold: 500.0,
            quantity_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 8 }
    }
}

impl OagConfig {
    /// Resolve and load configuration, falling back to defaults when no
    /// file is present.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = std::env::var("OAG_CONFIG") {
            return Self::load(&path);
        }
        if Path::new("oag.yaml").exists() {
            return Self::load("oag.yaml");
        }
        Ok(Self::default())
    }

    pub fn load(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        let config: Self =
            serde_yaml::from_str(&text).with_context(|| format!("parsing config file {path}"))?;
        info!(path, "configuration loaded");
        Ok(config)
    }

    /// The default HITL stack: registry risk OR policy buckets OR
    /// parameter thresholds. The policy strategy confirms unbucketed
    /// actions, so it only joins the stack when buckets are configured.
    pub fn build_hitl_stack(&self) -> Arc<dyn HitlStrategy> {
        let mut children: Vec<Arc<dyn HitlStrategy>> = vec![Arc::new(ConfirmByRisk::new())];
        let policies = &self.hitl.policies;
        if !policies.high_risk_actions.actions.is_empty()
            || !policies.medium_risk_actions.actions.is_empty()
            || !policies.low_risk_actions.actions.is_empty()
        {
            children.push(Arc::new(ConfirmByPolicy::new(policies.clone())));
        }
        children.push(Arc::new(ConfirmByThreshold {
            payment_threshold: self.hitl.thresholds.payment_threshold,
            adjustment_threshold: self.hitl.thresholds.adjustment_threshold,
            quantity_threshold: self.hitl.thresholds.quantity_threshold,
        }));
        Arc::new(Composite::new(children))
    }
}
