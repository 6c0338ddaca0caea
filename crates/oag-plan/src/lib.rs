//! Plan execution: dependency-ordered action invocations with compensating
//! rollback through an injected snapshot engine.

pub mod executor;
pub mod plan;
pub mod snapshot;

pub use executor::{
    CancelFlag, DagExecutor, ExecutionResult, PlanDispatcher, RollbackStatus, StepResult,
};
pub use plan::{ExecutionPlan, PlanStatus, PlanningStep, StepStatus};
pub use snapshot::{SnapshotEngine, SnapshotHandle};
