//! Multi-step plan execution against the hotel fixture, with compensating
//! rollback through the task snapshot engine.

mod helpers;

use std::sync::Arc;

use serde_json::json;

use helpers::{manager, HotelAdapter, HotelSession, HotelStore, ScriptedRecognizer};
use oag::actions::ActionRegistry;
use oag::core::OntologyRegistry;
use oag::events::EventBus;
use oag::plan::{DagExecutor, ExecutionPlan, PlanningStep, RollbackStatus, StepStatus};
use oag::{boot, Runtime};

fn runtime_with_store() -> (Arc<HotelStore>, Runtime) {
    let store = HotelStore::new();
    let events = Arc::new(EventBus::new());
    let registry = Arc::new(OntologyRegistry::new());
    let actions = Arc::new(ActionRegistry::new());
    let adapter = HotelAdapter::new(Arc::clone(&store), Arc::clone(&events));
    boot(&[&adapter], &registry, &actions).unwrap();
    let runtime = Runtime::builder(registry, actions, Box::new(ScriptedRecognizer::new()))
        .with_events(events)
        .build();
    (store, runtime)
}

fn task_plan() -> ExecutionPlan {
    ExecutionPlan::new(
        "create, assign and start a cleaning task for room 101",
        vec![
            PlanningStep::new(
                "s1",
                "create_task",
                json!({"room_number": "101", "task_type": "cleaning"}),
            )
            .with_description("Create a cleaning task"),
            PlanningStep::new("s2", "assign_task", json!({"task_id": 1, "assignee_id": 5}))
                .with_description("Assign the task to employee 5")
                .depends_on(["s1"]),
            PlanningStep::new("s3", "start_task", json!({"task_id": 1}))
                .with_description("Start the task")
                .depends_on(["s2"]),
        ],
    )
}

#[tokio::test]
async fn failed_step_rolls_back_created_task() {
    let (store, runtime) = runtime_with_store();
    store.seed_room("101", "vacant_dirty");
    // Employee 5 does not exist, so assign_task (s2) fails.
    let session = HotelSession::new(Arc::clone(&store));

    let snapshot_engine = helpers::TaskSnapshotEngine::new(Arc::clone(&store));
    let executor = DagExecutor::new(runtime.plan_dispatcher(manager(), session))
        .with_snapshot_engine(snapshot_engine.clone());

    let mut plan = task_plan();
    let result = executor
        .execute(&mut plan, &json!({}), None)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_step.as_deref(), Some("s2"));
    assert_eq!(plan.steps[0].status, StepStatus::Completed);
    assert_eq!(plan.steps[1].status, StepStatus::Failed);
    assert_eq!(plan.steps[2].status, StepStatus::Skipped);
    assert_eq!(result.rollback_status, Some(RollbackStatus::Success));

    // The task created by s1 was undone — nothing persisted remains.
    assert_eq!(store.task_count(), 0);
    assert!(!snapshot_engine.undone.lock().unwrap().is_empty());
}

#[tokio::test]
async fn plan_completes_when_every_step_succeeds() {
    let (store, runtime) = runtime_with_store();
    store.seed_room("101", "vacant_dirty");
    store.employees.lock().unwrap().push(5);
    let session = HotelSession::new(Arc::clone(&store));

    let snapshot_engine = helpers::TaskSnapshotEngine::new(Arc::clone(&store));
    let executor = DagExecutor::new(runtime.plan_dispatcher(manager(), session))
        .with_snapshot_engine(snapshot_engine.clone());

    let mut plan = task_plan();
    let result = executor
        .execute(&mut plan, &json!({}), None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.step_results.len(), 3);
    assert_eq!(store.task_count(), 1);
    let tasks = store.tasks.lock().unwrap();
    let task = tasks.values().next().unwrap();
    assert_eq!(task["status"], json!("in_progress"));
    assert_eq!(task["assignee_id"], json!(5));
    assert!(snapshot_engine.undone.lock().unwrap().is_empty());
}

#[tokio::test]
async fn guard_rejection_inside_plan_fails_the_step() {
    let (store, runtime) = runtime_with_store();
    store.seed_guest("A", "13800138000");
    let session = HotelSession::new(Arc::clone(&store));

    // update_guest with a 3-digit phone trips the registered constraint;
    // the dispatcher rejection surfaces as a failed step, not a crash.
    let mut plan = ExecutionPlan::new(
        "fix guest phone",
        vec![PlanningStep::new(
            "s1",
            "update_guest",
            json!({"name": "A", "phone": "123"}),
        )],
    );
    let executor = DagExecutor::new(runtime.plan_dispatcher(manager(), session));
    let result = executor
        .execute(&mut plan, &json!({}), None)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_step.as_deref(), Some("s1"));
    assert!(result.error.as_deref().unwrap().contains("guard"));
    assert_eq!(store.guest_phone("A").as_deref(), Some("13800138000"));
}
