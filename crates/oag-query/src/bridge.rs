//! Extractor bridge: resolves free-text extraction hints against the
//! registry and builds a `SemanticQuery` with a confidence score.
//!
//! The extractor itself (LLM or rule-based) is external; it emits an
//! [`ExtractedQuery`] of entity/field hints and conditions, and this
//! compiler decides how much of it can be grounded in the schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use oag_core::{EntityMetadata, OntologyRegistry};

use crate::compiler::RuleApplicator;
use crate::semantic_query::{FilterOperator, SemanticFilter, SemanticQuery};

/// Intermediate representation of query intent before compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedQuery {
    #[serde(default)]
    pub target_entity_hint: Option<String>,
    #[serde(default)]
    pub target_fields_hint: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<ExtractedCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedCondition {
    pub field: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

fn default_operator() -> String {
    "eq".into()
}

/// Outcome of hint resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationResult {
    pub query: Option<SemanticQuery>,
    pub confidence: f64,
    pub fallback_needed: bool,
    pub reasoning: String,
}

/// Resolves extraction hints against the ontology registry.
pub struct OntologyQueryCompiler<'r> {
    registry: &'r OntologyRegistry,
    rule_applicator: Option<&'r dyn RuleApplicator>,
}

impl<'r> OntologyQueryCompiler<'r> {
    pub fn new(registry: &'r OntologyRegistry) -> Self {
        Self {
            registry,
            rule_applicator: None,
        }
    }

    pub fn with_rule_applicator(mut self, applicator: &'r dyn RuleApplicator) -> Self {
        self.rule_applicator = Some(applicator);
        self
    }

    /// Resolution ladder:
    /// - entity resolved and every field hint resolved → 0.9
    /// - entity resolved, some fields resolved → 0.7
    /// - entity resolved, no fields resolved (or none requested) → 0.5
    /// - entity unresolved → 0.0
    ///
    /// `fallback_needed` is set below 0.3.
    pub fn compile(&self, extracted: &ExtractedQuery) -> CompilationResult {
        let hint = match extracted.target_entity_hint.as_deref() {
            Some(hint) if !hint.is_empty() => hint,
            _ => {
                return CompilationResult {
                    query: None,
                    confidence: 0.0,
                    fallback_needed: true,
                    reasoning: "no target entity hint provided".into(),
                }
            }
        };

        let Some(entity) = self.resolve_entity(hint) else {
            let suggestion = self.nearest_entity(hint);
            let reasoning = match suggestion {
                Some(name) => format!(
                    "could not resolve entity hint '{hint}' — closest registered entity is '{name}'"
                ),
                None => format!("could not resolve entity hint '{hint}' to any registered entity"),
            };
            return CompilationResult {
                query: None,
                confidence: 0.0,
                fallback_needed: true,
                reasoning,
            };
        };

        let (resolved_fields, unresolved_fields) =
            self.resolve_fields(&entity, &extracted.target_fields_hint);
        let filters = self.build_filters(&entity, &extracted.conditions);

        let (confidence, reasoning) = self.score(
            &entity,
            &extracted.target_fields_hint,
            &resolved_fields,
            &unresolved_fields,
        );

        debug!(entity = %entity.name, confidence, "compiled extracted query");

        let mut query = SemanticQuery::new(entity.name.clone()).with_fields(resolved_fields);
        query.filters = filters;

        CompilationResult {
            query: Some(query),
            confidence,
            fallback_needed: confidence < 0.3,
            reasoning,
        }
    }

    /// Case-insensitive resolution: exact name, then display name (from
    /// extensions), then description containment.
    fn resolve_entity(&self, hint: &str) -> Option<EntityMetadata> {
        let hint_lower = hint.to_lowercase();
        let entities = self.registry.get_entities();

        if let Some(entity) = entities
            .iter()
            .find(|e| e.name.to_lowercase() == hint_lower)
        {
            return Some(entity.clone());
        }
        if let Some(entity) = entities.iter().find(|e| {
            e.display_name()
                .map(|d| d.to_lowercase() == hint_lower)
                .unwrap_or(false)
        }) {
            return Some(entity.clone());
        }
        entities
            .iter()
            .find(|e| {
                !e.description.is_empty() && e.description.to_lowercase().contains(&hint_lower)
            })
            .cloned()
    }

    fn nearest_entity(&self, hint: &str) -> Option<String> {
        self.registry
            .get_entity_names()
            .into_iter()
            .map(|name| {
                let score = strsim::jaro_winkler(&name.to_lowercase(), &hint.to_lowercase());
                (name, score)
            })
            .filter(|(_, score)| *score >= 0.8)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name)
    }

    /// Field resolution: exact property name, then property display name,
    /// both case-insensitive.
    fn resolve_fields(
        &self,
        entity: &EntityMetadata,
        hints: &[String],
    ) -> (Vec<String>, Vec<String>) {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for hint in hints {
            let hint_lower = hint.to_lowercase();
            let matched = entity
                .properties
                .values()
                .find(|p| p.name.to_lowercase() == hint_lower)
                .or_else(|| {
                    entity.properties.values().find(|p| {
                        !p.display_name.is_empty()
                            && p.display_name.to_lowercase() == hint_lower
                    })
                });
            match matched {
                Some(property) => resolved.push(property.name.clone()),
                None => unresolved.push(hint.clone()),
            }
        }
        (resolved, unresolved)
    }

    fn build_filters(
        &self,
        entity: &EntityMetadata,
        conditions: &[ExtractedCondition],
    ) -> Vec<SemanticFilter> {
        conditions
            .iter()
            .filter(|condition| !condition.field.is_empty())
            .map(|condition| {
                // Unknown operator strings degrade to equality.
                let operator =
                    FilterOperator::from_str(&condition.operator).unwrap_or(FilterOperator::Eq);
                let value = match self.rule_applicator {
                    Some(applicator) if !condition.value.is_null() => {
                        applicator.apply(&entity.name, &condition.field, &condition.value)
                    }
                    _ => condition.value.clone(),
                };
                SemanticFilter::new(condition.field.clone(), operator, value)
            })
            .collect()
    }

    fn score(
        &self,
        entity: &EntityMetadata,
        hints: &[String],
        resolved: &[String],
        unresolved: &[String],
    ) -> (f64, String) {
        if hints.is_empty() {
            return (
                0.5,
                format!("entity '{}' resolved, but no fields were requested", entity.name),
            );
        }
        if resolved.is_empty() {
            return (
                0.5,
                format!(
                    "entity '{}' resolved, but none of the requested fields could be resolved: {unresolved:?}",
                    entity.name
                ),
            );
        }
        if unresolved.is_empty() {
            return (
                0.9,
                format!(
                    "entity '{}' resolved with all {} field(s): {resolved:?}",
                    entity.name,
                    resolved.len()
                ),
            );
        }
        (
            0.7,
            format!(
                "entity '{}' resolved with {}/{} field(s); unresolved: {unresolved:?}",
                entity.name,
                resolved.len(),
                hints.len()
            ),
        )
    }
}
