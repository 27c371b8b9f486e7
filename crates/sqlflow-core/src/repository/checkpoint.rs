//! Checkpoint store trait definition.

use sqlflow_types::checkpoint::{Checkpoint, CheckpointSummary};
use sqlflow_types::error::RepositoryError;

/// Durable, versioned storage for run checkpoints keyed by `thread_id`.
///
/// `put` is the atomic read-modify-write primitive: it succeeds only when
/// `checkpoint.version` is exactly one past the latest stored version for the
/// thread (or `1` for a new thread), and fails with
/// [`RepositoryError::Conflict`] otherwise. Two overlapping writers on the same
/// thread therefore cannot both advance it.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CheckpointStore: Send + Sync {
    fn put(
        &self,
        checkpoint: &Checkpoint,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The highest-versioned checkpoint for a thread.
    fn latest(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, RepositoryError>> + Send;

    /// Past checkpoints for a thread, newest first.
    fn history(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Checkpoint>, RepositoryError>> + Send;

    /// Threads whose latest checkpoint is suspended at an interrupt point,
    /// oldest suspension first (ties broken by thread id).
    fn list_suspended(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<CheckpointSummary>, RepositoryError>> + Send;
}

/// The version a new checkpoint must carry given the latest stored one.
pub fn next_version(latest: Option<u64>) -> u64 {
    latest.map_or(1, |v| v + 1)
}

/// Shared version check used by store implementations.
pub fn check_version(
    thread_id: &str,
    latest: Option<u64>,
    proposed: u64,
) -> Result<(), RepositoryError> {
    let expected = next_version(latest);
    if proposed == expected {
        Ok(())
    } else {
        Err(RepositoryError::Conflict(format!(
            "thread '{thread_id}' expected checkpoint version {expected}, got {proposed}"
        )))
    }
}
