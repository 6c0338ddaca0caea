//! Dot-path compilation: `SemanticQuery` → `QueryPlan`.
//!
//! The compiler resolves each path against the registry's relationship
//! graph, collects the joins the path traverses, and emits projections and
//! filters against the final field. It never executes anything — the plan
//! goes to a [`QueryExecutor`] bound to the host's persistence layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use oag_core::{Cardinality, EntityMetadata, OagError, OntologyRegistry, Result};

use crate::semantic_query::{FilterOperator, SemanticFilter, SemanticQuery};

/// One join the plan requires, recorded in first-traversal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub source_entity: String,
    pub source_table: String,
    pub target_entity: String,
    pub target_table: String,
    pub foreign_key: String,
    /// Entity whose table carries the foreign key column.
    pub foreign_key_entity: String,
    pub cardinality: Cardinality,
}

/// A projected column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// The original dot-path as requested.
    pub path: String,
    pub entity: String,
    pub table: String,
    pub field: String,
}

/// A compiled filter against a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledFilter {
    pub path: String,
    pub entity: String,
    pub table: String,
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

/// Executable plan for the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub root_entity: String,
    pub root_table: String,
    pub joins: Vec<JoinSpec>,
    pub projections: Vec<Projection>,
    pub filters: Vec<CompiledFilter>,
    pub order_by: Vec<String>,
    pub limit: u64,
    pub offset: u64,
    pub distinct: bool,
}

/// Substitutes domain aliases in filter values for normalized stored
/// values (a colloquial status name for its enum value). Consulted for
/// filter values only, never projections.
pub trait RuleApplicator: Send + Sync {
    fn apply(&self, entity: &str, field: &str, value: &Value) -> Value;
}

/// Runs compiled plans against the persistence bound via `register_model`.
/// External collaborator; tests supply an in-memory implementation.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, plan: &QueryPlan) -> Result<Vec<Map<String, Value>>>;
}

/// The compiler. Stateless apart from registry and optional applicator.
pub struct SemanticQueryCompiler<'r> {
    registry: &'r OntologyRegistry,
    rule_applicator: Option<&'r dyn RuleApplicator>,
}

impl<'r> SemanticQueryCompiler<'r> {
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

    pub fn compile(&self, query: &SemanticQuery) -> Result<QueryPlan> {
        let structural = query.validate();
        if let Some(first) = structural.first() {
            return Err(OagError::InvalidFilterValue {
                path: query.root_object.clone(),
                operator: "validate".into(),
                expected: first.clone(),
            });
        }

        let root = self
            .registry
            .get_entity(&query.root_object)
            .ok_or_else(|| OagError::UnknownEntity(query.root_object.clone()))?;

        let mut joins: Vec<JoinSpec> = Vec::new();
        let mut projections = Vec::new();
        let mut filters = Vec::new();

        if query.fields.is_empty() {
            // Default projection: every registered property of the root.
            for property in root.properties.values() {
                projections.push(Projection {
                    path: property.name.clone(),
                    entity: root.name.clone(),
                    table: self.table_of(&root),
                    field: property.name.clone(),
                });
            }
        } else {
            for path in &query.fields {
                let resolved = self.resolve_path(&root, path, &mut joins)?;
                projections.push(Projection {
                    path: path.clone(),
                    entity: resolved.entity,
                    table: resolved.table,
                    field: resolved.field,
                });
            }
        }

        for filter in &query.filters {
            filters.push(self.compile_filter(&root, filter, &mut joins)?);
        }

        debug!(
            root = %query.root_object,
            joins = joins.len(),
            projections = projections.len(),
            filters = filters.len(),
            "compiled semantic query"
        );

        Ok(QueryPlan {
            root_entity: root.name.clone(),
            root_table: self.table_of(&root),
            joins,
            projections,
            filters,
            order_by: query.order_by.clone(),
            limit: query.limit,
            offset: query.offset,
            distinct: query.distinct,
        })
    }

    fn compile_filter(
        &self,
        root: &EntityMetadata,
        filter: &SemanticFilter,
        joins: &mut Vec<JoinSpec>,
    ) -> Result<CompiledFilter> {
        // Arity checks mirror SemanticQuery::validate so a directly built
        // filter cannot slip through.
        if filter.operator.takes_list() && !filter.value.is_array() {
            return Err(OagError::InvalidFilterValue {
                path: filter.path.clone(),
                operator: filter.operator.as_str().into(),
                expected: "a list value".into(),
            });
        }
        if filter.operator == FilterOperator::Between {
            let len = filter.value.as_array().map(Vec::len).unwrap_or(0);
            if len != 2 {
                return Err(OagError::InvalidFilterValue {
                    path: filter.path.clone(),
                    operator: "between".into(),
                    expected: "a two-element list".into(),
                });
            }
        }
        if !filter.operator.takes_list()
            && !filter.operator.takes_no_value()
            && filter.value.is_array()
        {
            return Err(OagError::InvalidFilterValue {
                path: filter.path.clone(),
                operator: filter.operator.as_str().into(),
                expected: "a scalar value".into(),
            });
        }

        let resolved = self.resolve_path(root, &filter.path, joins)?;

        // Alias substitution applies to filter values only.
        let value = match (self.rule_applicator, &filter.value) {
            (Some(applicator), Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| applicator.apply(&resolved.entity, &resolved.field, item))
                    .collect(),
            ),
            (Some(applicator), value) if !filter.operator.takes_no_value() => {
                applicator.apply(&resolved.entity, &resolved.field, value)
            }
            _ => filter.value.clone(),
        };

        Ok(CompiledFilter {
            path: filter.path.clone(),
            entity: resolved.entity,
            table: resolved.table,
            field: resolved.field,
            operator: filter.operator,
            value,
        })
    }

    /// Walk `a.b.c.d` from `root`: every token but the last must be a
    /// relationship; the last must be a property (or a relationship, for
    /// relation projection). Traversed edges are appended to `joins` once.
    fn resolve_path(
        &self,
        root: &EntityMetadata,
        path: &str,
        joins: &mut Vec<JoinSpec>,
    ) -> Result<ResolvedField> {
        let tokens: Vec<&str> = path.split('.').collect();
        let mut current = root.clone();

        for (index, token) in tokens.iter().enumerate() {
            let is_last = index == tokens.len() - 1;

            if let Some(relationship) = current.relationship(token) {
                let target = self
                    .registry
                    .get_entity(&relationship.target_entity)
                    .ok_or_else(|| OagError::UnknownEntity(relationship.target_entity.clone()))?;

                let join = JoinSpec {
                    source_entity: current.name.clone(),
                    source_table: self.table_of(&current),
                    target_entity: target.name.clone(),
                    target_table: self.table_of(&target),
                    foreign_key: relationship.foreign_key.clone(),
                    foreign_key_entity: relationship.foreign_key_entity.clone(),
                    cardinality: relationship.cardinality,
                };
                if !joins.contains(&join) {
                    joins.push(join);
                }

                if is_last {
                    // Relation projection: the path ends on the relationship
                    // itself; project the target's primary key.
                    let field = target
                        .properties
                        .values()
                        .find(|p| p.is_primary_key)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| "id".to_string());
                    return Ok(ResolvedField {
                        entity: target.name.clone(),
                        table: self.table_of(&target),
                        field,
                    });
                }
                current = target;
                continue;
            }

            if is_last && current.property(token).is_some() {
                return Ok(ResolvedField {
                    entity: current.name.clone(),
                    table: self.table_of(&current),
                    field: (*token).to_string(),
                });
            }

            return Err(OagError::UnresolvedPath {
                path: path.to_string(),
                segment: (*token).to_string(),
                entity: current.name.clone(),
                suggestion: self.nearest_name(&current, token),
            });
        }

        // Unreachable: split always yields at least one token.
        Err(OagError::UnresolvedPath {
            path: path.to_string(),
            segment: String::new(),
            entity: root.name.clone(),
            suggestion: None,
        })
    }

    /// Nearest property or relationship name, for error messages.
    fn nearest_name(&self, entity: &EntityMetadata, token: &str) -> Option<String> {
        let candidates = entity
            .properties
            .keys()
            .cloned()
            .chain(entity.relationships.iter().map(|r| r.name.clone()));
        candidates
            .map(|name| {
                let score = strsim::jaro_winkler(&name.to_lowercase(), &token.to_lowercase());
                (name, score)
            })
            .filter(|(_, score)| *score >= 0.8)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name)
    }

    fn table_of(&self, entity: &EntityMetadata) -> String {
        if let Some(model) = self.registry.get_model(&entity.name) {
            return model.table_name().to_string();
        }
        if !entity.table_name.is_empty() {
            return entity.table_name.clone();
        }
        entity.name.clone()
    }
}

struct ResolvedField {
    entity: String,
    table: String,
    field: String,
}
