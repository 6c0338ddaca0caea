//! Semantic queries against the hotel schema: multi-hop compilation,
//! alias substitution, and execution through a bound query executor.

mod helpers;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use helpers::{HotelAdapter, HotelStore};
use oag::actions::ActionRegistry;
use oag::core::{OntologyRegistry, Result};
use oag::events::EventBus;
use oag::query::{
    CompilationResult, ExtractedCondition, ExtractedQuery, FilterOperator, OntologyQueryCompiler,
    QueryExecutor, QueryPlan, RuleApplicator, SemanticFilter, SemanticQuery,
    SemanticQueryCompiler,
};

fn hotel_registry() -> Arc<OntologyRegistry> {
    let store = HotelStore::new();
    let events = Arc::new(EventBus::new());
    let registry = Arc::new(OntologyRegistry::new());
    let actions = Arc::new(ActionRegistry::new());
    let adapter = HotelAdapter::new(store, events);
    oag::boot(&[&adapter], &registry, &actions).unwrap();
    registry
}

// =============================================================================
// MULTI-HOP COMPILATION
// =============================================================================

#[test]
fn guest_to_room_number_compiles_to_two_joins() {
    let registry = hotel_registry();
    let compiler = SemanticQueryCompiler::new(&registry);

    let query = SemanticQuery::new("Guest")
        .with_fields(["name", "stays.room.room_number"])
        .with_filter(SemanticFilter::eq("stays.status", json!("ACTIVE")));

    let plan = compiler.compile(&query).unwrap();

    assert_eq!(plan.root_entity, "Guest");
    assert_eq!(plan.root_table, "guests");

    let joined: Vec<(String, String)> = plan
        .joins
        .iter()
        .map(|j| (j.source_entity.clone(), j.target_entity.clone()))
        .collect();
    assert_eq!(
        joined,
        vec![
            ("Guest".to_string(), "StayRecord".to_string()),
            ("StayRecord".to_string(), "Room".to_string()),
        ]
    );

    assert_eq!(plan.projections[0].entity, "Guest");
    assert_eq!(plan.projections[0].field, "name");
    assert_eq!(plan.projections[1].entity, "Room");
    assert_eq!(plan.projections[1].field, "room_number");

    assert_eq!(plan.filters[0].entity, "StayRecord");
    assert_eq!(plan.filters[0].field, "status");
    assert_eq!(plan.filters[0].operator, FilterOperator::Eq);
}

#[test]
fn reservation_style_deep_path_requires_registered_edges() {
    let registry = hotel_registry();
    let compiler = SemanticQueryCompiler::new(&registry);

    // Room has no `guest` relationship, so the deep path fails at that hop.
    let query = SemanticQuery::new("Room").with_fields(["guest.name"]);
    let err = compiler.compile(&query).unwrap_err();
    assert!(matches!(err, oag::core::OagError::UnresolvedPath { .. }));
}

// =============================================================================
// EXTRACTOR BRIDGE WITH ALIASES
// =============================================================================

struct RoomStatusAliases;

impl RuleApplicator for RoomStatusAliases {
    fn apply(&self, entity: &str, field: &str, value: &Value) -> Value {
        if entity == "Room" && field == "status" {
            if let Some("空净") = value.as_str() {
                return json!("vacant_clean");
            }
        }
        value.clone()
    }
}

#[test]
fn extractor_hints_compile_with_alias_rescue() {
    let registry = hotel_registry();
    let aliases = RoomStatusAliases;
    let compiler = OntologyQueryCompiler::new(&registry).with_rule_applicator(&aliases);

    let extracted = ExtractedQuery {
        target_entity_hint: Some("room".into()),
        target_fields_hint: vec!["room_number".into(), "status".into()],
        conditions: vec![ExtractedCondition {
            field: "status".into(),
            operator: "eq".into(),
            value: json!("空净"),
        }],
    };

    let CompilationResult {
        query,
        confidence,
        fallback_needed,
        ..
    } = compiler.compile(&extracted);

    assert_eq!(confidence, 0.9);
    assert!(!fallback_needed);
    let query = query.unwrap();
    assert_eq!(query.root_object, "Room");
    assert_eq!(query.filters[0].value, json!("vacant_clean"));
}

// =============================================================================
// EXECUTION THROUGH A BOUND EXECUTOR
// =============================================================================

/// Executes single-table plans against in-memory rows. Supports the
/// operators the room listing needs.
struct MapExecutor {
    tables: HashMap<String, Vec<Map<String, Value>>>,
}

#[async_trait]
impl QueryExecutor for MapExecutor {
    async fn execute(&self, plan: &QueryPlan) -> Result<Vec<Map<String, Value>>> {
        let rows = self.tables.get(&plan.root_table).cloned().unwrap_or_default();
        let mut selected: Vec<Map<String, Value>> = rows
            .into_iter()
            .filter(|row| {
                plan.filters.iter().all(|filter| {
                    let cell = row.get(&filter.field).cloned().unwrap_or(Value::Null);
                    match filter.operator {
                        FilterOperator::Eq => cell == filter.value,
                        FilterOperator::Ne => cell != filter.value,
                        FilterOperator::In => filter
                            .value
                            .as_array()
                            .map(|items| items.contains(&cell))
                            .unwrap_or(false),
                        _ => true,
                    }
                })
            })
            .map(|row| {
                let mut projected = Map::new();
                for projection in &plan.projections {
                    if let Some(value) = row.get(&projection.field) {
                        projected.insert(projection.field.clone(), value.clone());
                    }
                }
                projected
            })
            .collect();
        selected.truncate(plan.limit as usize);
        Ok(selected)
    }
}

#[tokio::test]
async fn compiled_plan_runs_against_bound_rows() {
    let registry = hotel_registry();
    let compiler = SemanticQueryCompiler::new(&registry);

    let query = SemanticQuery::new("Room")
        .with_fields(["room_number", "status"])
        .with_filter(SemanticFilter::new(
            "status",
            FilterOperator::In,
            json!(["vacant_clean"]),
        ));
    let plan = compiler.compile(&query).unwrap();

    let executor = MapExecutor {
        tables: HashMap::from([(
            "rooms".to_string(),
            vec![
                json!({"room_number": "101", "status": "vacant_clean"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                json!({"room_number": "102", "status": "occupied"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ],
        )]),
    };

    let rows = executor.execute(&plan).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["room_number"], json!("101"));
}
