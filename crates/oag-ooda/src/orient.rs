//! Orient phase — intent recognition plus context attachment.
//!
//! The recognizer is pluggable; an LLM-backed extractor is expected in
//! production, a stub in tests. The orient phase never fails the pipeline:
//! recognition errors produce an invalid orientation the decide phase can
//! report.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::observe::Observation;

/// A recognized intent: the action the text asks for plus extracted
/// parameter values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub action_type: String,
    #[serde(default)]
    pub entities: Map<String, Value>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl IntentResult {
    pub fn new(action_type: impl Into<String>, confidence: f64) -> Self {
        Self {
            action_type: action_type.into(),
            entities: Map::new(),
            confidence,
            requires_confirmation: false,
        }
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entities.insert(key.into(), value);
        self
    }
}

/// Pluggable intent recognition. `Ok(None)` means "no intent found";
/// `Err` means the recognizer itself broke.
#[async_trait]
pub trait IntentRecognizer: Send + Sync {
    async fn recognize(
        &self,
        observation: &Observation,
        context: &Map<String, Value>,
    ) -> anyhow::Result<Option<IntentResult>>;
}

/// Contributes key-value pairs to the orientation context (security
/// context, conversation state, static configuration).
pub trait ContextProvider: Send + Sync {
    fn provide(&self) -> Map<String, Value>;
}

/// Fixed key-value context (user id, role, locale).
pub struct StaticContext(pub Map<String, Value>);

impl ContextProvider for StaticContext {
    fn provide(&self) -> Map<String, Value> {
        self.0.clone()
    }
}

/// Output of the orient phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orientation {
    pub observation: Observation,
    pub intent: Option<IntentResult>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub extracted_entities: Map<String, Value>,
    #[serde(default)]
    pub confidence: f64,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

pub struct OrientPhase {
    recognizer: Box<dyn IntentRecognizer>,
    providers: Vec<Box<dyn ContextProvider>>,
}

impl OrientPhase {
    pub fn new(recognizer: Box<dyn IntentRecognizer>) -> Self {
        Self {
            recognizer,
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: Box<dyn ContextProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub async fn orient(&self, observation: Observation) -> Orientation {
        let mut context = Map::new();
        for provider in &self.providers {
            for (key, value) in provider.provide() {
                context.insert(key, value);
            }
        }

        if !observation.is_valid {
            let errors = observation.validation_errors.clone();
            return Orientation {
                observation,
                intent: None,
                context,
                extracted_entities: Map::new(),
                confidence: 0.0,
                is_valid: false,
                errors,
            };
        }

        match self.recognizer.recognize(&observation, &context).await {
            Ok(Some(intent)) => {
                debug!(action = %intent.action_type, confidence = intent.confidence, "intent recognized");
                Orientation {
                    observation,
                    extracted_entities: intent.entities.clone(),
                    confidence: intent.confidence,
                    intent: Some(intent),
                    context,
                    is_valid: true,
                    errors: Vec::new(),
                }
            }
            Ok(None) => Orientation {
                observation,
                intent: None,
                context,
                extracted_entities: Map::new(),
                confidence: 0.0,
                is_valid: true,
                errors: Vec::new(),
            },
            Err(err) => {
                warn!(error = %err, "intent recognition failed");
                Orientation {
                    observation,
                    intent: None,
                    context,
                    extracted_entities: Map::new(),
                    confidence: 0.0,
                    is_valid: false,
                    errors: vec![format!("intent recognition failed: {err}")],
                }
            }
        }
    }
}
