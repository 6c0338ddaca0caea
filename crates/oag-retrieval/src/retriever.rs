//! Schema retriever — the minimal ontology slice relevant to a text.
//!
//! Search hits name entities directly or through their properties and
//! actions; one-hop relationship expansion then pulls in directly related
//! entities so joinful queries can be expressed against the slice.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use oag_core::{OntologyRegistry, Result};

use crate::item::{SchemaItem, SchemaItemType};
use crate::store::VectorStore;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchMetadata {
    pub selected_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expansion_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The focused slice handed to prompt builders.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub query: String,
    pub entities: Vec<String>,
    /// Retrieved property ids (`Entity.prop`).
    pub fields: Vec<String>,
    pub schema_json: Value,
    pub search_metadata: SearchMetadata,
}

pub struct SchemaRetriever {
    store: Arc<dyn VectorStore>,
    registry: Arc<OntologyRegistry>,
    top_k: usize,
}

impl SchemaRetriever {
    pub fn new(store: Arc<dyn VectorStore>, registry: Arc<OntologyRegistry>) -> Self {
        Self {
            store,
            registry,
            top_k: 8,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[instrument(skip(self))]
    pub async fn retrieve_for_query(&self, text: &str) -> Result<RetrievalResult> {
        self.retrieve_with_options(text, self.top_k, true).await
    }

    pub async fn retrieve_with_options(
        &self,
        text: &str,
        top_k: usize,
        expand_relationships: bool,
    ) -> Result<RetrievalResult> {
        let hits = self.store.search(text, top_k).await?;
        if hits.is_empty() {
            return Ok(RetrievalResult {
                query: text.to_string(),
                entities: Vec::new(),
                fields: Vec::new(),
                schema_json: json!({}),
                search_metadata: SearchMetadata {
                    selected_count: 0,
                    expansion_reasons: Vec::new(),
                    message: Some("no schema items matched the query".into()),
                },
            });
        }

        let selected_count = hits.len();
        let mut entities = extract_entities(&hits);
        let fields = extract_fields(&hits);

        let expansion_reasons = if expand_relationships {
            self.expand_one_hop(&mut entities)
        } else {
            Vec::new()
        };

        let schema_json = self.build_schema_json(&entities, &fields);
        debug!(
            entities = entities.len(),
            fields = fields.len(),
            "schema slice assembled"
        );

        Ok(RetrievalResult {
            query: text.to_string(),
            entities: entities.into_iter().collect(),
            fields,
            schema_json,
            search_metadata: SearchMetadata {
                selected_count,
                expansion_reasons,
                message: None,
            },
        })
    }

    /// Bypass embedding entirely: slice for explicitly named entities.
    pub fn retrieve_by_entity(&self, names: &[String]) -> RetrievalResult {
        let entities: BTreeSet<String> = names.iter().cloned().collect();
        let schema_json = self.build_schema_json(&entities, &[]);
        RetrievalResult {
            query: String::new(),
            entities: entities.into_iter().collect(),
            fields: Vec::new(),
            schema_json,
            search_metadata: SearchMetadata {
                selected_count: names.len(),
                expansion_reasons: Vec::new(),
                message: None,
            },
        }
    }

    /// One-hop expansion over the registry's relationship map. Depth is
    /// fixed at 1; the visited set prevents cycles from re-adding.
    fn expand_one_hop(&self, entities: &mut BTreeSet<String>) -> Vec<String> {
        let mut reasons = Vec::new();
        let seeds: Vec<String> = entities.iter().cloned().collect();
        for entity in seeds {
            for relationship in self.registry.get_relationships(&entity) {
                if entities.insert(relationship.target_entity.clone()) {
                    reasons.push(format!(
                        "{} -> {} ({})",
                        entity, relationship.target_entity, relationship.cardinality
                    ));
                }
            }
        }
        reasons
    }

    /// Schema restricted to the entity set: retrieved properties (all of
    /// them when none were retrieved for an entity) plus all
    /// relationships.
    fn build_schema_json(&self, entities: &BTreeSet<String>, fields: &[String]) -> Value {
        let mut schema = Map::new();
        for entity_name in entities {
            let Some(entity) = self.registry.get_entity(entity_name) else {
                schema.insert(
                    entity_name.clone(),
                    json!({"fields": {}, "relationships": []}),
                );
                continue;
            };

            let retrieved: Vec<&str> = fields
                .iter()
                .filter_map(|field| field.strip_prefix(&format!("{entity_name}.")))
                .collect();

            let mut field_map = Map::new();
            for property in entity.properties.values() {
                if !retrieved.is_empty() && !retrieved.contains(&property.name.as_str()) {
                    continue;
                }
                field_map.insert(
                    property.name.clone(),
                    json!({
                        "type": property.semantic_type.as_str(),
                        "description": property.description,
                    }),
                );
            }

            let relationships: Vec<String> = entity
                .relationships
                .iter()
                .map(|relationship| relationship.to_display())
                .collect();

            schema.insert(
                entity_name.clone(),
                json!({
                    "description": entity.description,
                    "fields": field_map,
                    "relationships": relationships,
                }),
            );
        }
        Value::Object(schema)
    }
}

fn extract_entities(hits: &[SchemaItem]) -> BTreeSet<String> {
    hits.iter().map(|item| item.entity.clone()).collect()
}

fn extract_fields(hits: &[SchemaItem]) -> Vec<String> {
    hits.iter()
        .filter(|item| item.item_type == SchemaItemType::Property)
        .map(|item| item.id.clone())
        .collect()
}
