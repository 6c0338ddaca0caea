//! Handler contract and outcome shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::HandlerContext;
use crate::params::ValidatedParams;

/// What every handler returns: `success` and `message` always, plus
/// arbitrary domain fields the core forwards unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// An action's callable half. Handlers should catch their own domain
/// failures and return `ActionOutcome::fail(...)`; an `Err` from `execute`
/// is treated as unexpected and surfaces as a dispatch error.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        params: ValidatedParams,
        ctx: &HandlerContext,
    ) -> anyhow::Result<ActionOutcome>;
}

/// Adapter so tests and small adapters can register closures.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(ValidatedParams, &HandlerContext) -> anyhow::Result<ActionOutcome> + Send + Sync,
{
    async fn execute(
        &self,
        params: ValidatedParams,
        ctx: &HandlerContext,
    ) -> anyhow::Result<ActionOutcome> {
        (self.0)(params, ctx)
    }
}
