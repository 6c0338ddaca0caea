//! Plan and step types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

/// One action invocation inside a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningStep {
    pub step_id: String,
    pub action_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "pending")]
    pub status: StepStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

fn pending() -> StepStatus {
    StepStatus::Pending
}

impl PlanningStep {
    pub fn new(step_id: impl Into<String>, action_type: impl Into<String>, params: Value) -> Self {
        Self {
            step_id: step_id.into(),
            action_type: action_type.into(),
            description: String::new(),
            params,
            dependencies: Vec::new(),
            status: StepStatus::Pending,
            result: None,
            error_message: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// A step is ready when every dependency has completed.
    pub fn is_ready(&self, completed: &[String]) -> bool {
        self.dependencies
            .iter()
            .all(|dep| completed.iter().any(|done| done == dep))
    }
}

/// A dependency-ordered plan of action invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub plan_id: String,
    pub goal: String,
    pub steps: Vec<PlanningStep>,
    #[serde(default = "plan_pending")]
    pub status: PlanStatus,
}

fn plan_pending() -> PlanStatus {
    PlanStatus::Pending
}

impl ExecutionPlan {
    pub fn new(goal: impl Into<String>, steps: Vec<PlanningStep>) -> Self {
        Self {
            plan_id: Uuid::new_v4().to_string(),
            goal: goal.into(),
            steps,
            status: PlanStatus::Pending,
        }
    }

    pub fn with_id(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = plan_id.into();
        self
    }

    /// Next pending step whose dependencies are all completed, in plan
    /// order. `None` when nothing further can run.
    pub fn next_executable_step(&self) -> Option<usize> {
        let completed: Vec<String> = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.step_id.clone())
            .collect();
        self.steps
            .iter()
            .position(|s| s.status == StepStatus::Pending && s.is_ready(&completed))
    }

    pub fn step(&self, step_id: &str) -> Option<&PlanningStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Plain-text progress rendering for prompts and logs.
    pub fn to_summary(&self) -> String {
        let mut lines = vec![format!("Plan: {}", self.goal)];
        for (index, step) in self.steps.iter().enumerate() {
            let marker = match step.status {
                StepStatus::Completed => "done",
                StepStatus::InProgress => "running",
                StepStatus::Failed => "failed",
                StepStatus::Skipped => "skipped",
                StepStatus::Pending => "pending",
            };
            let label = if step.description.is_empty() {
                &step.action_type
            } else {
                &step.description
            };
            lines.push(format!("{}. [{}] {}", index + 1, marker, label));
            if !step.dependencies.is_empty() {
                lines.push(format!("   depends on: {}", step.dependencies.join(", ")));
            }
        }
        lines.join("\n")
    }
}
