//! Workflow engine: wave-based execution over the static graph with one
//! durable checkpoint per wave.
//!
//! # Execution flow
//!
//! 1. `start` persists the initial run (pending = start node) as version 1.
//! 2. Each wave takes the pending nodes, runs them concurrently via
//!    `tokio::JoinSet` against a shared snapshot of the run, checks every
//!    update against the node's declared writes and merges the updates in
//!    pending order.
//! 3. Outbound edges are evaluated on the merged run: fan-outs schedule every
//!    target, routers pick one declared target, join nodes wait until all of
//!    their predecessors arrived.
//! 4. The resulting state is checkpointed. Pending nodes marked
//!    interrupt-before are never entered by a wave; when only those remain the
//!    run is `Suspended` and the engine returns.
//! 5. `resume` loads the latest checkpoint, merges caller input when the run
//!    was suspended and continues the loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinSet;

use sqlflow_types::checkpoint::{Checkpoint, CheckpointSummary, RunStatus};
use sqlflow_types::config::EngineConfig;
use sqlflow_types::node::NodeId;
use sqlflow_types::run::{
    ChatMessage, DatabaseSelection, NodeFailure, RunField, RunUpdate, UserInfo, WorkflowRun,
};

use crate::repository::checkpoint::{CheckpointStore, next_version};

use super::checkpoint::{CheckpointError, CheckpointManager};
use super::graph::{Edge, GraphError, WorkflowGraph};
use super::nodes::{NodeError, NodeRunner};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Waves a single `start`/`resume` call may execute before giving up.
pub const MAX_WAVES_PER_CALL: usize = 256;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Caller input merged into a suspended run on resume.
#[derive(Debug, Clone, Default)]
pub struct ResumeInput {
    /// Free-text answer to the human feedback prompt.
    pub feedback: Option<String>,
}

impl ResumeInput {
    pub fn feedback(text: impl Into<String>) -> Self {
        Self {
            feedback: Some(text.into()),
        }
    }
}

/// Where a run stands after a `start` or `resume` call.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub thread_id: String,
    pub status: RunStatus,
    pub version: u64,
    pub pending: Vec<NodeId>,
    pub run: WorkflowRun,
}

impl From<Checkpoint> for RunHandle {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            thread_id: checkpoint.thread_id,
            status: checkpoint.status,
            version: checkpoint.version,
            pending: checkpoint.pending,
            run: checkpoint.run,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors that abort a `start`/`resume` call. Node-level dependency failures
/// are recorded on the run instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("node '{node}' wrote undeclared field '{field}'")]
    UndeclaredWrite { node: NodeId, field: RunField },

    #[error("router for '{node}' chose undeclared target '{target}'")]
    InvalidRoute { node: NodeId, target: NodeId },

    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("thread already exists: {0}")]
    ThreadExists(String),

    #[error("node task failed: {0}")]
    Join(String),

    #[error("thread '{0}' exceeded the wave limit for one call")]
    WaveLimit(String),
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Resumable executor for a [`WorkflowGraph`].
///
/// Generic over `S: CheckpointStore`. Calls on the same thread are serialized
/// in-process; across processes the store's versioned `put` rejects the
/// slower writer.
pub struct WorkflowEngine<S: CheckpointStore> {
    graph: Arc<WorkflowGraph>,
    runner: Arc<NodeRunner>,
    checkpoints: CheckpointManager<S>,
    thread_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Handle on one thread's mutex. Dropping the last handle removes the map
/// entry, so the lock table only holds threads with a call in flight.
struct ThreadLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    thread_id: &'a str,
    lock: Arc<Mutex<()>>,
}

impl ThreadLock<'_> {
    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for ThreadLock<'_> {
    fn drop(&mut self) {
        // Idle when only the map and this handle hold it. New handles are
        // cloned under the same shard lock, so none can appear mid-check.
        self.locks
            .remove_if(self.thread_id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

/// Mutable traversal state between waves.
struct Cursor {
    run: WorkflowRun,
    pending: Vec<NodeId>,
    join_arrivals: BTreeMap<NodeId, Vec<NodeId>>,
    version: u64,
}

impl<S: CheckpointStore> WorkflowEngine<S> {
    /// Engine over the question-to-SQL workflow.
    pub fn new(store: S, runner: NodeRunner) -> Result<Self, EngineError> {
        Ok(Self::with_graph(store, runner, WorkflowGraph::sql_workflow()?))
    }

    pub fn with_graph(store: S, runner: NodeRunner, graph: WorkflowGraph) -> Self {
        Self {
            graph: Arc::new(graph),
            runner: Arc::new(runner),
            checkpoints: CheckpointManager::new(store),
            thread_locks: DashMap::new(),
        }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        self.runner.config()
    }

    fn thread_lock<'a>(&'a self, thread_id: &'a str) -> ThreadLock<'a> {
        let lock = self
            .thread_locks
            .entry(thread_id.to_string())
            .or_default()
            .clone();
        ThreadLock {
            locks: &self.thread_locks,
            thread_id,
            lock,
        }
    }

    /// Threads with a live lock entry.
    #[cfg(test)]
    pub(crate) fn locked_threads(&self) -> usize {
        self.thread_locks.len()
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Start a new run and execute it until it completes or suspends.
    pub async fn start(
        &self,
        thread_id: &str,
        question: &str,
        user_info: UserInfo,
        selected_databases: Vec<DatabaseSelection>,
    ) -> Result<RunHandle, EngineError> {
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;

        if self.checkpoints.load_latest(thread_id).await?.is_some() {
            return Err(EngineError::ThreadExists(thread_id.to_string()));
        }

        let run = WorkflowRun::new(thread_id, question, user_info, selected_databases);
        let pending = vec![self.graph.start()];
        let version = next_version(None);
        self.checkpoints
            .persist(version, RunStatus::Running, &run, &pending, &BTreeMap::new())
            .await?;

        tracing::info!(thread_id, "started workflow run");

        let cursor = Cursor {
            run,
            pending,
            join_arrivals: BTreeMap::new(),
            version,
        };
        self.drive(cursor, false).await
    }

    /// Continue a run from its latest checkpoint.
    ///
    /// Completed runs are returned unchanged. Suspended runs take `input` and
    /// enter their interrupt nodes. Runs left `Running` by a crash continue
    /// from the pending set; `input` is ignored for them.
    pub async fn resume(&self, thread_id: &str, input: ResumeInput) -> Result<RunHandle, EngineError> {
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;

        let checkpoint = self
            .checkpoints
            .load_latest(thread_id)
            .await?
            .ok_or_else(|| EngineError::ThreadNotFound(thread_id.to_string()))?;

        let status = checkpoint.status;
        let mut cursor = Cursor {
            run: checkpoint.run,
            pending: checkpoint.pending,
            join_arrivals: checkpoint.join_arrivals,
            version: checkpoint.version,
        };

        match status {
            RunStatus::Completed => {
                tracing::debug!(thread_id, "resume on completed run is a no-op");
                Ok(cursor.into_handle(status))
            }
            RunStatus::Suspended => {
                let feedback = input
                    .feedback
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty());
                if let Some(text) = &feedback {
                    cursor.run.messages.push(ChatMessage::human(text.clone()));
                }
                cursor.run.human_feedback = feedback;

                tracing::info!(
                    thread_id,
                    version = cursor.version,
                    has_feedback = cursor.run.human_feedback.is_some(),
                    "resuming suspended run"
                );
                self.drive(cursor, true).await
            }
            RunStatus::Running => {
                tracing::info!(
                    thread_id,
                    version = cursor.version,
                    pending = ?cursor.pending,
                    "resuming interrupted run"
                );
                self.drive(cursor, false).await
            }
        }
    }

    /// The latest checkpoint of a thread.
    pub async fn get_state(&self, thread_id: &str) -> Result<Checkpoint, EngineError> {
        self.checkpoints
            .load_latest(thread_id)
            .await?
            .ok_or_else(|| EngineError::ThreadNotFound(thread_id.to_string()))
    }

    /// Nodes the thread will run next.
    pub async fn pending(&self, thread_id: &str) -> Result<Vec<NodeId>, EngineError> {
        Ok(self.get_state(thread_id).await?.pending)
    }

    /// Checkpoints of a thread, newest first.
    pub async fn history(&self, thread_id: &str, limit: u32) -> Result<Vec<Checkpoint>, EngineError> {
        Ok(self.checkpoints.history(thread_id, limit).await?)
    }

    pub async fn list_suspended(&self) -> Result<Vec<CheckpointSummary>, EngineError> {
        Ok(self.checkpoints.list_suspended().await?)
    }

    // -----------------------------------------------------------------------
    // Execution loop
    // -----------------------------------------------------------------------

    async fn drive(&self, mut cursor: Cursor, mut enter_interrupts: bool) -> Result<RunHandle, EngineError> {
        let thread_id = cursor.run.thread_id.clone();

        for wave_idx in 0..MAX_WAVES_PER_CALL {
            let (wave, deferred): (Vec<NodeId>, Vec<NodeId>) = cursor
                .pending
                .iter()
                .copied()
                .partition(|node| enter_interrupts || !self.graph.is_interrupt(*node));
            enter_interrupts = false;

            if wave.is_empty() {
                let status = self.status_for(&cursor.pending);
                return Ok(cursor.into_handle(status));
            }

            tracing::debug!(
                thread_id = %thread_id,
                wave = wave_idx,
                nodes = ?wave,
                "processing wave"
            );

            let results = self.run_wave(&wave, &cursor.run).await?;

            // Validate every update before merging any of them.
            for (node, result) in &results {
                if let Ok(update) = result {
                    self.check_writes(*node, update)?;
                }
            }

            for (node, result) in results {
                match result {
                    Ok(update) => update.apply_to(&mut cursor.run),
                    Err(err) => {
                        tracing::warn!(
                            thread_id = %thread_id,
                            node = %node,
                            error = %err,
                            "node failed"
                        );
                        cursor.run.node_failures.push(NodeFailure {
                            node,
                            attempt: cursor.run.attempt_count,
                            error: err.to_string(),
                        });
                    }
                }
            }

            let mut next = deferred;
            for node in &wave {
                for target in self.successors(*node, &cursor.run, &mut cursor.join_arrivals)? {
                    if !next.contains(&target) {
                        next.push(target);
                    }
                }
            }
            cursor.pending = next;

            let status = self.status_for(&cursor.pending);
            cursor.version += 1;
            self.checkpoints
                .persist(
                    cursor.version,
                    status,
                    &cursor.run,
                    &cursor.pending,
                    &cursor.join_arrivals,
                )
                .await?;

            match status {
                RunStatus::Running => continue,
                RunStatus::Suspended => {
                    tracing::info!(
                        thread_id = %thread_id,
                        version = cursor.version,
                        pending = ?cursor.pending,
                        "run suspended for input"
                    );
                    return Ok(cursor.into_handle(status));
                }
                RunStatus::Completed => {
                    tracing::info!(
                        thread_id = %thread_id,
                        version = cursor.version,
                        attempts = cursor.run.attempt_count,
                        "run completed"
                    );
                    return Ok(cursor.into_handle(status));
                }
            }
        }

        Err(EngineError::WaveLimit(thread_id))
    }

    /// Run one wave concurrently. Results come back in wave order.
    async fn run_wave(
        &self,
        wave: &[NodeId],
        run: &WorkflowRun,
    ) -> Result<Vec<(NodeId, Result<RunUpdate, NodeError>)>, EngineError> {
        let snapshot = Arc::new(run.clone());
        let mut join_set = JoinSet::new();

        for (idx, node) in wave.iter().copied().enumerate() {
            let runner = Arc::clone(&self.runner);
            let snapshot = Arc::clone(&snapshot);
            join_set.spawn(async move {
                let result = runner.run(node, &snapshot).await;
                (idx, node, result)
            });
        }

        let mut slots: Vec<Option<(NodeId, Result<RunUpdate, NodeError>)>> =
            (0..wave.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (idx, node, result) =
                joined.map_err(|e| EngineError::Join(format!("task join error: {e}")))?;
            slots[idx] = Some((node, result));
        }
        Ok(slots.into_iter().flatten().collect())
    }

    fn check_writes(&self, node: NodeId, update: &RunUpdate) -> Result<(), EngineError> {
        let declared = self.graph.writes(node);
        for field in update.fields() {
            if !declared.is_some_and(|d| d.contains(&field)) {
                return Err(EngineError::UndeclaredWrite { node, field });
            }
        }
        Ok(())
    }

    /// Nodes that become ready after `node` completed.
    fn successors(
        &self,
        node: NodeId,
        run: &WorkflowRun,
        join_arrivals: &mut BTreeMap<NodeId, Vec<NodeId>>,
    ) -> Result<Vec<NodeId>, EngineError> {
        let targets = match self.graph.edge(node) {
            None => return Ok(Vec::new()),
            Some(Edge::Unconditional(targets)) => targets.clone(),
            Some(Edge::Conditional { router, targets }) => {
                let target = router(run, self.runner.config());
                if !targets.contains(&target) {
                    return Err(EngineError::InvalidRoute { node, target });
                }
                tracing::debug!(
                    thread_id = %run.thread_id,
                    from = %node,
                    to = %target,
                    "routed"
                );
                vec![target]
            }
        };

        let mut ready = Vec::with_capacity(targets.len());
        for target in targets {
            match self.graph.join_predecessors(target) {
                None => ready.push(target),
                Some(predecessors) => {
                    let arrived = join_arrivals.entry(target).or_default();
                    if !arrived.contains(&node) {
                        arrived.push(node);
                    }
                    if predecessors.iter().all(|p| arrived.contains(p)) {
                        join_arrivals.remove(&target);
                        ready.push(target);
                    }
                }
            }
        }
        Ok(ready)
    }

    fn status_for(&self, pending: &[NodeId]) -> RunStatus {
        if pending.is_empty() {
            RunStatus::Completed
        } else if pending.iter().all(|n| self.graph.is_interrupt(*n)) {
            RunStatus::Suspended
        } else {
            RunStatus::Running
        }
    }
}

impl Cursor {
    fn into_handle(self, status: RunStatus) -> RunHandle {
        RunHandle {
            thread_id: self.run.thread_id.clone(),
            status,
            version: self.version,
            pending: self.pending,
            run: self.run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display() {
        let err = EngineError::UndeclaredWrite {
            node: NodeId::AccuracyGate,
            field: RunField::SqlQuery,
        };
        assert_eq!(
            err.to_string(),
            "node 'accuracy_gate' wrote undeclared field 'sql_query'"
        );

        let err = EngineError::ThreadNotFound("t-1".into());
        assert!(err.to_string().contains("t-1"));
    }

    #[test]
    fn handle_from_checkpoint_keeps_pending() {
        let run = WorkflowRun::new("t-2", "q", UserInfo::default(), vec![]);
        let checkpoint = Checkpoint::new(
            3,
            RunStatus::Suspended,
            run,
            vec![NodeId::HumanFeedback],
            BTreeMap::new(),
        );
        let handle = RunHandle::from(checkpoint);
        assert_eq!(handle.thread_id, "t-2");
        assert_eq!(handle.version, 3);
        assert_eq!(handle.pending, vec![NodeId::HumanFeedback]);
    }
}
