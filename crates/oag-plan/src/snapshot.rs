//! Snapshot engine port — the only cross-handler compensation mechanism.
//!
//! An implementation records before/after state for the scope one action
//! touches and reverts to `before` on undo. Snapshot I/O is a declared
//! suspension point.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHandle {
    pub snapshot_id: String,
}

#[async_trait]
pub trait SnapshotEngine: Send + Sync {
    /// Capture the intended side-effect scope before a step runs.
    async fn create_snapshot(&self, context: &Value) -> anyhow::Result<SnapshotHandle>;

    /// Record the step outcome against an existing snapshot.
    async fn mark_executed(&self, snapshot_id: &str, outcome: &Value) -> anyhow::Result<()>;

    /// Revert the captured scope. `Ok(false)` means the undo ran but could
    /// not restore state.
    async fn undo(&self, snapshot_id: &str) -> anyhow::Result<bool>;
}
