//! Shared test fixture: a small hotel domain registered entirely through
//! the adapter contract. The framework under test stays domain-agnostic;
//! every hotel-specific string lives here.

#![allow(dead_code)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use oag::actions::{
    ActionOutcome, ActionRegistry, FnHandler, HandlerContext, ParamSpec, ParamsModel,
    PersistenceSession, ValidatedParams,
};
use oag::core::{
    ActionCategory, ActionSpec, Cardinality, ConstraintMetadata, ConstraintType, EntityMetadata,
    GlossaryExample, OntologyRegistry, PropertyMetadata, RelationshipMetadata, Result, RiskLevel,
    SemanticType, Severity, StateMachine, StateTransition, TableModel, UserContext,
};
use oag::events::{Event, EventBus};
use oag::ooda::{IntentRecognizer, IntentResult, Observation};
use oag::plan::{SnapshotEngine, SnapshotHandle};
use oag::DomainAdapter;

// ── In-memory hotel store ────────────────────────────────────────

/// The persistence stand-in: rooms, guests and tasks in mutexed maps.
#[derive(Default)]
pub struct HotelStore {
    /// room_number -> status
    pub rooms: Mutex<HashMap<String, String>>,
    /// guest name -> guest record
    pub guests: Mutex<HashMap<String, Value>>,
    /// task id -> task record
    pub tasks: Mutex<HashMap<i64, Value>>,
    /// employee ids that exist
    pub employees: Mutex<Vec<i64>>,
    next_task_id: AtomicI64,
}

impl HotelStore {
    pub fn new() -> Arc<Self> {
        let store = Self::default();
        store.next_task_id.store(1, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn seed_room(&self, room_number: &str, status: &str) {
        self.rooms
            .lock()
            .unwrap()
            .insert(room_number.to_string(), status.to_string());
    }

    pub fn room_status(&self, room_number: &str) -> Option<String> {
        self.rooms.lock().unwrap().get(room_number).cloned()
    }

    pub fn seed_guest(&self, name: &str, phone: &str) {
        self.guests
            .lock()
            .unwrap()
            .insert(name.to_string(), json!({"name": name, "phone": phone}));
    }

    pub fn guest_phone(&self, name: &str) -> Option<String> {
        self.guests
            .lock()
            .unwrap()
            .get(name)
            .and_then(|g| g["phone"].as_str().map(str::to_string))
    }

    pub fn create_task(&self, room_number: &str, task_type: &str) -> i64 {
        let id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
        self.tasks.lock().unwrap().insert(
            id,
            json!({
                "id": id,
                "room_number": room_number,
                "task_type": task_type,
                "status": "pending",
                "assignee_id": null,
            }),
        );
        id
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

/// A transaction scope over the store.
pub struct HotelSession {
    pub store: Arc<HotelStore>,
}

impl HotelSession {
    pub fn new(store: Arc<HotelStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

impl PersistenceSession for HotelSession {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn store_of(ctx: &HandlerContext) -> Arc<HotelStore> {
    let session = ctx
        .session
        .as_any()
        .downcast_ref::<HotelSession>()
        .expect("hotel tests dispatch with a HotelSession");
    Arc::clone(&session.store)
}

// ── Domain adapter ───────────────────────────────────────────────

pub struct HotelAdapter {
    pub store: Arc<HotelStore>,
    pub events: Arc<EventBus>,
}

impl HotelAdapter {
    pub fn new(store: Arc<HotelStore>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }
}

impl DomainAdapter for HotelAdapter {
    fn name(&self) -> &str {
        "hotel"
    }

    fn register_ontology(&self, registry: &OntologyRegistry) -> Result<()> {
        registry.register_entity(
            EntityMetadata::new("Room")
                .with_description("A bookable hotel room")
                .with_table("rooms")
                .with_property(PropertyMetadata::new("id", SemanticType::Integer).primary_key())
                .with_property(
                    PropertyMetadata::new("room_number", SemanticType::String)
                        .required()
                        .with_display_name("Room Number"),
                )
                .with_property(PropertyMetadata::new("status", SemanticType::String).required()),
        );
        registry.register_entity(
            EntityMetadata::new("Guest")
                .with_description("A registered hotel guest")
                .with_table("guests")
                .aggregate_root()
                .with_property(PropertyMetadata::new("id", SemanticType::Integer).primary_key())
                .with_property(
                    PropertyMetadata::new("name", SemanticType::String)
                        .required()
                        .with_display_name("Guest Name"),
                )
                .with_property(PropertyMetadata::new("phone", SemanticType::String)),
        );
        registry.register_entity(
            EntityMetadata::new("StayRecord")
                .with_description("One guest's stay in one room")
                .with_table("stay_records")
                .with_property(PropertyMetadata::new("id", SemanticType::Integer).primary_key())
                .with_property(PropertyMetadata::new("status", SemanticType::String)),
        );
        registry.register_entity(
            EntityMetadata::new("Task")
                .with_description("A housekeeping or maintenance task")
                .with_table("tasks")
                .with_property(PropertyMetadata::new("id", SemanticType::Integer).primary_key())
                .with_property(PropertyMetadata::new("task_type", SemanticType::String))
                .with_property(PropertyMetadata::new("status", SemanticType::String)),
        );
        registry.register_entity(
            EntityMetadata::new("Bill")
                .with_description("A guest's folio")
                .with_table("bills")
                .with_property(PropertyMetadata::new("id", SemanticType::Integer).primary_key())
                .with_property(
                    PropertyMetadata::new("outstanding_amount", SemanticType::Number),
                ),
        );

        registry.register_relationship(
            "Guest",
            RelationshipMetadata::new("stays", "StayRecord", Cardinality::OneToMany)
                .with_foreign_key("guest_id", "StayRecord")
                .with_inverse("guest"),
        )?;
        registry.register_relationship(
            "StayRecord",
            RelationshipMetadata::new("guest", "Guest", Cardinality::ManyToOne)
                .with_foreign_key("guest_id", "StayRecord")
                .with_inverse("stays"),
        )?;
        registry.register_relationship(
            "StayRecord",
            RelationshipMetadata::new("room", "Room", Cardinality::ManyToOne)
                .with_foreign_key("room_id", "StayRecord"),
        )?;
        registry.register_relationship(
            "Room",
            RelationshipMetadata::new("stays", "StayRecord", Cardinality::OneToMany)
                .with_foreign_key("room_id", "StayRecord"),
        )?;

        registry.register_state_machine(room_state_machine())?;

        registry.register_constraint(ConstraintMetadata {
            id: "guest_phone_length".into(),
            name: "Guest phone length".into(),
            description: "Mainland numbers are 11 digits".into(),
            constraint_type: ConstraintType::Property,
            severity: Severity::Error,
            entity: "Guest".into(),
            action: "update_guest".into(),
            condition_text: "phone must be 11 digits".into(),
            condition_code: Some("len(param.phone) == 11".into()),
            error_message: "phone number must be exactly 11 digits".into(),
            suggestion_message: Some("check the number and try again".into()),
        });

        registry.register_model("Room", Arc::new(TableModel::new("rooms")));
        registry.register_model("Guest", Arc::new(TableModel::new("guests")));
        registry.register_model("StayRecord", Arc::new(TableModel::new("stay_records")));
        Ok(())
    }

    fn register_actions(
        &self,
        registry: &OntologyRegistry,
        actions: &ActionRegistry,
    ) -> Result<()> {
        let events = Arc::clone(&self.events);
        actions.register(
            registry,
            ActionSpec::new("walkin_checkin", "Room", ActionCategory::Mutation)
                .with_description("Check a walk-in guest into a room")
                .with_roles(["receptionist", "manager"])
                .with_required_fields([
                    "room_number",
                    "guest_name",
                    "guest_phone",
                    "expected_check_out",
                ])
                .with_risk(RiskLevel::Medium)
                .with_keywords(["散客", "直接入住", "walk-in"])
                .with_semantic_category("checkin_type")
                .with_category_description("How the guest arrived at the hotel")
                .with_glossary_examples(vec![GlossaryExample {
                    correct: "'散客入住，王六儿' → guest_name='王六儿'".into(),
                    incorrect: "'散客入住，王六儿' → guest_name='散客'".into(),
                }])
                .undoable(),
            ParamsModel::new(vec![
                ParamSpec::new("room_number", SemanticType::String).required(),
                ParamSpec::new("guest_name", SemanticType::String).required(),
                ParamSpec::new("guest_phone", SemanticType::String).required(),
                ParamSpec::new("expected_check_out", SemanticType::Date).required(),
            ]),
            Arc::new(FnHandler(move |params: ValidatedParams, ctx: &HandlerContext| {
                let store = store_of(ctx);
                let room_number = params.get_str("room_number").unwrap_or_default().to_string();
                let guest_name = params.get_str("guest_name").unwrap_or_default().to_string();
                {
                    let mut rooms = store.rooms.lock().unwrap();
                    match rooms.get_mut(&room_number) {
                        Some(status) => *status = "occupied".to_string(),
                        None => {
                            return Ok(ActionOutcome::fail(format!(
                                "room {room_number} not found"
                            )))
                        }
                    }
                }
                store.seed_guest(
                    &guest_name,
                    params.get_str("guest_phone").unwrap_or_default(),
                );
                events.publish(
                    &Event::new(
                        "guest_checked_in",
                        json!({"room_number": room_number, "guest_name": guest_name}),
                    )
                    .with_source("walkin_checkin"),
                );
                Ok(ActionOutcome::ok("checked in")
                    .with("room_number", json!(room_number))
                    .with("room_status", json!("occupied")))
            })),
        )?;

        actions.register(
            registry,
            ActionSpec::new("update_guest", "Guest", ActionCategory::Mutation)
                .with_description("Update a guest profile")
                .with_roles(["receptionist", "manager"]),
            ParamsModel::new(vec![
                ParamSpec::new("name", SemanticType::String).required(),
                ParamSpec::new("phone", SemanticType::String).required(),
            ]),
            Arc::new(FnHandler(|params: ValidatedParams, ctx: &HandlerContext| {
                let store = store_of(ctx);
                let name = params.get_str("name").unwrap_or_default();
                let phone = params.get_str("phone").unwrap_or_default();
                store.seed_guest(name, phone);
                Ok(ActionOutcome::ok("guest updated"))
            })),
        )?;

        actions.register(
            registry,
            ActionSpec::new("query_rooms", "Room", ActionCategory::Query)
                .with_description("List rooms and their status")
                .with_roles(["receptionist", "manager"]),
            ParamsModel::open(),
            Arc::new(FnHandler(|_: ValidatedParams, ctx: &HandlerContext| {
                let store = store_of(ctx);
                let rooms = store.rooms.lock().unwrap().clone();
                let listing: Vec<Value> = rooms
                    .iter()
                    .map(|(number, status)| json!({"room_number": number, "status": status}))
                    .collect();
                Ok(ActionOutcome::ok("rooms listed").with("rooms", json!(listing)))
            })),
        )?;

        actions.register(
            registry,
            ActionSpec::new("create_task", "Task", ActionCategory::Mutation)
                .with_description("Create a housekeeping task for a room")
                .with_roles(["receptionist", "manager", "housekeeping"])
                .with_required_fields(["room_number", "task_type"])
                .with_risk(RiskLevel::Low)
                .undoable(),
            ParamsModel::new(vec![
                ParamSpec::new("room_number", SemanticType::String).required(),
                ParamSpec::new("task_type", SemanticType::String).required(),
            ]),
            Arc::new(FnHandler(|params: ValidatedParams, ctx: &HandlerContext| {
                let store = store_of(ctx);
                let id = store.create_task(
                    params.get_str("room_number").unwrap_or_default(),
                    params.get_str("task_type").unwrap_or_default(),
                );
                Ok(ActionOutcome::ok("task created").with("task_id", json!(id)))
            })),
        )?;

        actions.register(
            registry,
            ActionSpec::new("assign_task", "Task", ActionCategory::Mutation)
                .with_description("Assign a task to an employee")
                .with_roles(["manager", "housekeeping"])
                .with_required_fields(["task_id", "assignee_id"])
                .with_risk(RiskLevel::Low)
                .undoable(),
            ParamsModel::new(vec![
                ParamSpec::new("task_id", SemanticType::Integer).required(),
                ParamSpec::new("assignee_id", SemanticType::Integer).required(),
            ]),
            Arc::new(FnHandler(|params: ValidatedParams, ctx: &HandlerContext| {
                let store = store_of(ctx);
                let assignee = params.get_i64("assignee_id").unwrap_or(0);
                if !store.employees.lock().unwrap().contains(&assignee) {
                    return Ok(ActionOutcome::fail(format!(
                        "employee {assignee} not found"
                    )));
                }
                let task_id = params.get_i64("task_id").unwrap_or(0);
                let mut tasks = store.tasks.lock().unwrap();
                match tasks.get_mut(&task_id) {
                    Some(task) => {
                        task["assignee_id"] = json!(assignee);
                        task["status"] = json!("assigned");
                        Ok(ActionOutcome::ok("task assigned"))
                    }
                    None => Ok(ActionOutcome::fail(format!("task {task_id} not found"))),
                }
            })),
        )?;

        actions.register(
            registry,
            ActionSpec::new("start_task", "Task", ActionCategory::Mutation)
                .with_description("Start work on a task")
                .with_roles(["manager", "housekeeping"])
                .with_required_fields(["task_id"])
                .with_risk(RiskLevel::Low),
            ParamsModel::new(vec![
                ParamSpec::new("task_id", SemanticType::Integer).required()
            ]),
            Arc::new(FnHandler(|params: ValidatedParams, ctx: &HandlerContext| {
                let store = store_of(ctx);
                let task_id = params.get_i64("task_id").unwrap_or(0);
                let mut tasks = store.tasks.lock().unwrap();
                match tasks.get_mut(&task_id) {
                    Some(task) => {
                        task["status"] = json!("in_progress");
                        Ok(ActionOutcome::ok("task started"))
                    }
                    None => Ok(ActionOutcome::fail(format!("task {task_id} not found"))),
                }
            })),
        )?;

        actions.register(
            registry,
            ActionSpec::new("adjust_bill", "Bill", ActionCategory::Mutation)
                .with_description("Adjust a folio amount")
                .with_roles(["manager"])
                .with_required_fields(["bill_id", "adjustment_amount", "reason"])
                .with_risk(RiskLevel::Critical)
                .financial(),
            ParamsModel::new(vec![
                ParamSpec::new("bill_id", SemanticType::Integer).required(),
                ParamSpec::new("adjustment_amount", SemanticType::Number).required(),
                ParamSpec::new("reason", SemanticType::String).required(),
            ]),
            Arc::new(FnHandler(|_: ValidatedParams, _: &HandlerContext| {
                Ok(ActionOutcome::ok("bill adjusted"))
            })),
        )?;

        Ok(())
    }
}

pub fn room_state_machine() -> StateMachine {
    StateMachine::new(
        "Room",
        vec![
            "vacant_clean".into(),
            "occupied".into(),
            "vacant_dirty".into(),
            "out_of_order".into(),
        ],
        vec![
            StateTransition::new("vacant_clean", "occupied", "check_in"),
            StateTransition::new("occupied", "vacant_dirty", "check_out"),
            StateTransition::new("vacant_dirty", "vacant_clean", "clean"),
            StateTransition::new("vacant_clean", "out_of_order", "mark_broken"),
            StateTransition::new("out_of_order", "vacant_dirty", "repair"),
        ],
        "vacant_clean",
    )
    .expect("room state machine is well formed")
}

// ── Scripted intent recognizer ───────────────────────────────────

/// Maps exact normalized inputs to intents; the stand-in for the
/// LLM-backed extractor.
#[derive(Default)]
pub struct ScriptedRecognizer {
    intents: HashMap<String, IntentResult>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, input: &str, intent: IntentResult) -> Self {
        self.intents.insert(input.to_string(), intent);
        self
    }
}

#[async_trait]
impl IntentRecognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        observation: &Observation,
        _context: &Map<String, Value>,
    ) -> anyhow::Result<Option<IntentResult>> {
        Ok(self.intents.get(&observation.normalized_input).cloned())
    }
}

// ── Snapshot engine over the task table ──────────────────────────

/// Snapshots the whole task table before each step and restores it on
/// undo. Enough compensation for plan tests.
pub struct TaskSnapshotEngine {
    store: Arc<HotelStore>,
    snapshots: Mutex<HashMap<String, HashMap<i64, Value>>>,
    counter: AtomicI64,
    pub undone: Mutex<Vec<String>>,
}

impl TaskSnapshotEngine {
    pub fn new(store: Arc<HotelStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            snapshots: Mutex::new(HashMap::new()),
            counter: AtomicI64::new(1),
            undone: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SnapshotEngine for TaskSnapshotEngine {
    async fn create_snapshot(&self, _context: &Value) -> anyhow::Result<SnapshotHandle> {
        let id = format!("snap-{}", self.counter.fetch_add(1, Ordering::SeqCst));
        let tasks = self.store.tasks.lock().unwrap().clone();
        self.snapshots.lock().unwrap().insert(id.clone(), tasks);
        Ok(SnapshotHandle { snapshot_id: id })
    }

    async fn mark_executed(&self, _snapshot_id: &str, _outcome: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    async fn undo(&self, snapshot_id: &str) -> anyhow::Result<bool> {
        let snapshot = self.snapshots.lock().unwrap().get(snapshot_id).cloned();
        match snapshot {
            Some(tasks) => {
                *self.store.tasks.lock().unwrap() = tasks;
                self.undone.lock().unwrap().push(snapshot_id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ── Convenience ──────────────────────────────────────────────────

pub fn receptionist() -> UserContext {
    UserContext::new("u-recept", "receptionist").with_name("Front Desk")
}

pub fn manager() -> UserContext {
    UserContext::new("u-manager", "manager").with_name("Shift Manager")
}
