//! Durable checkpoint manager for workflow runs.
//!
//! Wraps a `CheckpointStore` and gives the engine a narrow API: persist one
//! checkpoint per completed wave (or suspension), load the latest one to
//! resume, and list history for inspection.

use std::collections::BTreeMap;

use sqlflow_types::checkpoint::{Checkpoint, CheckpointSummary, RunStatus};
use sqlflow_types::error::RepositoryError;
use sqlflow_types::node::NodeId;
use sqlflow_types::run::WorkflowRun;

use crate::repository::checkpoint::CheckpointStore;

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Manages durable checkpoints for workflow runs.
///
/// Generic over `S: CheckpointStore` so it works with SQLite and the
/// in-memory store alike.
pub struct CheckpointManager<S: CheckpointStore> {
    store: S,
}

impl<S: CheckpointStore> CheckpointManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist the state reached after a wave.
    pub async fn persist(
        &self,
        version: u64,
        status: RunStatus,
        run: &WorkflowRun,
        pending: &[NodeId],
        join_arrivals: &BTreeMap<NodeId, Vec<NodeId>>,
    ) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = Checkpoint::new(
            version,
            status,
            run.clone(),
            pending.to_vec(),
            join_arrivals.clone(),
        );
        self.store.put(&checkpoint).await.map_err(CheckpointError::from)?;

        tracing::debug!(
            thread_id = %checkpoint.thread_id,
            version,
            status = %status,
            pending = ?pending,
            "checkpointed run"
        );
        Ok(checkpoint)
    }

    pub async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.store.latest(thread_id).await?)
    }

    pub async fn history(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        Ok(self.store.history(thread_id, limit).await?)
    }

    pub async fn list_suspended(&self) -> Result<Vec<CheckpointSummary>, CheckpointError> {
        Ok(self.store.list_suspended().await?)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying store operation failed.
    #[error("checkpoint store error: {0}")]
    Repository(String),

    /// Another writer advanced the thread first.
    #[error("checkpoint conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for CheckpointError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => CheckpointError::Conflict(msg),
            other => CheckpointError::Repository(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
