//! DAG executor — runs one plan respecting dependency order, with
//! compensating rollback when a step fails.
//!
//! This implementation schedules sequentially in topological order (the
//! conservative default the concurrency model allows); completion order is
//! therefore deterministic and rollback walks it in reverse.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use oag_core::{OagError, Result};

use crate::plan::{ExecutionPlan, PlanStatus, StepStatus};
use crate::snapshot::SnapshotEngine;

/// Dispatch callback the executor drives. The result is the handler's
/// outcome dictionary; `success: false` fails the step.
#[async_trait]
pub trait PlanDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        action_type: &str,
        params: &Value,
        context: &Value,
    ) -> anyhow::Result<Value>;
}

/// Cooperative cancellation checked between steps.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    Success,
    Partial,
}

impl RollbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub action_type: String,
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

/// Outcome of a whole plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub plan_id: String,
    pub step_results: Vec<StepResult>,
    #[serde(default)]
    pub failed_step: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// `None` when no snapshot engine was attached.
    #[serde(default)]
    pub rollback_status: Option<RollbackStatus>,
}

/// The executor. Owns one plan per call; safe to share across workers.
pub struct DagExecutor {
    dispatcher: Arc<dyn PlanDispatcher>,
    snapshot_engine: Option<Arc<dyn SnapshotEngine>>,
}

impl DagExecutor {
    pub fn new(dispatcher: Arc<dyn PlanDispatcher>) -> Self {
        Self {
            dispatcher,
            snapshot_engine: None,
        }
    }

    pub fn with_snapshot_engine(mut self, engine: Arc<dyn SnapshotEngine>) -> Self {
        self.snapshot_engine = Some(engine);
        self
    }

    /// Execute the plan. `CyclicPlan` is detected before any step runs;
    /// step failures are reported in the `ExecutionResult`, not as errors.
    #[instrument(skip(self, plan, context, cancel), fields(plan_id = %plan.plan_id))]
    pub async fn execute(
        &self,
        plan: &mut ExecutionPlan,
        context: &Value,
        cancel: Option<&CancelFlag>,
    ) -> Result<ExecutionResult> {
        self.check_acyclic(plan)?;

        plan.status = PlanStatus::Executing;
        let mut step_results: Vec<StepResult> = Vec::new();
        // Completion order, as (step index, snapshot id).
        let mut completed: Vec<(usize, Option<String>)> = Vec::new();
        let mut failed_step: Option<String> = None;
        let mut error: Option<String> = None;

        while let Some(index) = plan.next_executable_step() {
            let cancelled = cancel.map(CancelFlag::is_cancelled).unwrap_or(false);
            if cancelled {
                // The current step is treated as failed; rollback follows.
                let step = &mut plan.steps[index];
                step.status = StepStatus::Failed;
                step.error_message = Some("cancelled".into());
                failed_step = Some(step.step_id.clone());
                error = Some("plan execution cancelled".into());
                step_results.push(StepResult {
                    step_id: step.step_id.clone(),
                    action_type: step.action_type.clone(),
                    success: false,
                    result: None,
                    error: Some("cancelled".into()),
                    snapshot_id: None,
                });
                break;
            }

            // Pre-execution snapshot of the step's side-effect scope.
            let snapshot_id = self.take_snapshot(plan, index, context).await;

            let (action_type, params) = {
                let step = &mut plan.steps[index];
                step.status = StepStatus::InProgress;
                (step.action_type.clone(), step.params.clone())
            };
            debug!(step = %plan.steps[index].step_id, action = %action_type, "executing step");

            let dispatch = self.dispatcher.dispatch(&action_type, &params, context).await;

            match dispatch {
                Ok(outcome) if outcome_succeeded(&outcome) => {
                    let step = &mut plan.steps[index];
                    step.status = StepStatus::Completed;
                    step.result = Some(outcome.clone());
                    if let (Some(engine), Some(id)) = (&self.snapshot_engine, &snapshot_id) {
                        if let Err(err) = engine
                            .mark_executed(id, &serde_json::json!({ "result": outcome }))
                            .await
                        {
                            warn!(snapshot = %id, error = %err, "mark_executed failed");
                        }
                    }
                    step_results.push(StepResult {
                        step_id: step.step_id.clone(),
                        action_type,
                        success: true,
                        result: step.result.clone(),
                        error: None,
                        snapshot_id: snapshot_id.clone(),
                    });
                    completed.push((index, snapshot_id));
                }
                Ok(outcome) => {
                    let message = outcome
                        .get("message")
                        .and_then(Value::as_str)
                        .or_else(|| outcome.get("error").and_then(Value::as_str))
                        .unwrap_or("step failed")
                        .to_string();
                    let step = &mut plan.steps[index];
                    step.status = StepStatus::Failed;
                    step.error_message = Some(message.clone());
                    failed_step = Some(step.step_id.clone());
                    error = Some(message.clone());
                    step_results.push(StepResult {
                        step_id: step.step_id.clone(),
                        action_type,
                        success: false,
                        result: Some(outcome),
                        error: Some(message),
                        snapshot_id,
                    });
                    break;
                }
                Err(err) => {
                    let message = err.to_string();
                    let step = &mut plan.steps[index];
                    step.status = StepStatus::Failed;
                    step.error_message = Some(message.clone());
                    failed_step = Some(step.step_id.clone());
                    error = Some(message.clone());
                    step_results.push(StepResult {
                        step_id: step.step_id.clone(),
                        action_type,
                        success: false,
                        result: None,
                        error: Some(message),
                        snapshot_id,
                    });
                    break;
                }
            }
        }

        if failed_step.is_some() {
            for step in plan.steps.iter_mut() {
                if step.status == StepStatus::Pending {
                    step.status = StepStatus::Skipped;
                }
            }
            plan.status = PlanStatus::Failed;
            let rollback_status = self.rollback(&completed).await;
            info!(
                plan = %plan.plan_id,
                failed = failed_step.as_deref().unwrap_or(""),
                "plan failed"
            );
            return Ok(ExecutionResult {
                success: false,
                plan_id: plan.plan_id.clone(),
                step_results,
                failed_step,
                error,
                rollback_status,
            });
        }

        plan.status = PlanStatus::Completed;
        Ok(ExecutionResult {
            success: true,
            plan_id: plan.plan_id.clone(),
            step_results,
            failed_step: None,
            error: None,
            rollback_status: None,
        })
    }

    /// Kahn's algorithm over step dependencies; any remainder is a cycle.
    fn check_acyclic(&self, plan: &ExecutionPlan) -> Result<()> {
        let ids: HashMap<&str, usize> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.step_id.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; plan.steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); plan.steps.len()];
        for (index, step) in plan.steps.iter().enumerate() {
            for dep in &step.dependencies {
                // Unknown dependencies can never complete — treat as a
                // wiring error equivalent to a cycle.
                let Some(&dep_index) = ids.get(dep.as_str()) else {
                    return Err(OagError::CyclicPlan(step.step_id.clone()));
                };
                in_degree[index] += 1;
                dependents[dep_index].push(index);
            }
        }

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut visited = 0;
        while let Some(index) = queue.pop_front() {
            visited += 1;
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if visited != plan.steps.len() {
            let stuck = plan
                .steps
                .iter()
                .enumerate()
                .find(|(i, _)| in_degree[*i] > 0)
                .map(|(_, s)| s.step_id.clone())
                .unwrap_or_default();
            return Err(OagError::CyclicPlan(stuck));
        }
        Ok(())
    }

    async fn take_snapshot(
        &self,
        plan: &ExecutionPlan,
        index: usize,
        context: &Value,
    ) -> Option<String> {
        let engine = self.snapshot_engine.as_ref()?;
        let step = &plan.steps[index];
        let snapshot_context = serde_json::json!({
            "plan_id": plan.plan_id,
            "step_id": step.step_id,
            "action_type": step.action_type,
            "params": step.params,
            "context": context,
        });
        match engine.create_snapshot(&snapshot_context).await {
            Ok(handle) => Some(handle.snapshot_id),
            Err(err) => {
                // Snapshot failure is logged but never blocks the step.
                warn!(step = %step.step_id, error = %err, "snapshot creation failed");
                None
            }
        }
    }

    /// Undo completed steps in reverse completion order.
    async fn rollback(&self, completed: &[(usize, Option<String>)]) -> Option<RollbackStatus> {
        let engine = self.snapshot_engine.as_ref()?;
        let mut all_ok = true;
        for (_, snapshot_id) in completed.iter().rev() {
            let Some(id) = snapshot_id else {
                all_ok = false;
                continue;
            };
            match engine.undo(id).await {
                Ok(true) => {}
                Ok(false) => all_ok = false,
                Err(err) => {
                    warn!(snapshot = %id, error = %err, "undo failed");
                    all_ok = false;
                }
            }
        }
        Some(if all_ok {
            RollbackStatus::Success
        } else {
            RollbackStatus::Partial
        })
    }
}

fn outcome_succeeded(outcome: &Value) -> bool {
    outcome
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
