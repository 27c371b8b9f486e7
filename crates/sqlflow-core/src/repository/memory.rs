//! In-memory checkpoint store.

use std::sync::Arc;

use dashmap::DashMap;

use sqlflow_types::checkpoint::{Checkpoint, CheckpointSummary, RunStatus};
use sqlflow_types::error::RepositoryError;

use super::checkpoint::{CheckpointStore, check_version};

/// Process-local checkpoint store. Clones share the same storage, so several
/// engines can be pointed at one store to simulate a restart.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    threads: Arc<DashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        // The entry guard holds the shard lock for the whole check-and-push.
        let mut versions = self
            .threads
            .entry(checkpoint.thread_id.clone())
            .or_default();
        let latest = versions.last().map(|c| c.version);
        check_version(&checkpoint.thread_id, latest, checkpoint.version)?;
        versions.push(checkpoint.clone());
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, RepositoryError> {
        Ok(self
            .threads
            .get(thread_id)
            .and_then(|versions| versions.last().cloned()))
    }

    async fn history(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        Ok(self
            .threads
            .get(thread_id)
            .map(|versions| {
                versions
                    .iter()
                    .rev()
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_suspended(&self) -> Result<Vec<CheckpointSummary>, RepositoryError> {
        let mut out: Vec<CheckpointSummary> = self
            .threads
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .last()
                    .filter(|c| c.status == RunStatus::Suspended)
                    .map(CheckpointSummary::from)
            })
            .collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlflow_types::node::NodeId;
    use sqlflow_types::run::{UserInfo, WorkflowRun};
    use std::collections::BTreeMap;

    fn checkpoint(thread: &str, version: u64, status: RunStatus) -> Checkpoint {
        let run = WorkflowRun::new(thread, "q", UserInfo::default(), vec![]);
        Checkpoint::new(version, status, run, vec![NodeId::GenerateSql], BTreeMap::new())
    }

    #[tokio::test]
    async fn put_requires_consecutive_versions() {
        let store = InMemoryCheckpointStore::new();
        store.put(&checkpoint("t", 1, RunStatus::Running)).await.unwrap();

        let err = store
            .put(&checkpoint("t", 1, RunStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let err = store
            .put(&checkpoint("t", 3, RunStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        store.put(&checkpoint("t", 2, RunStatus::Running)).await.unwrap();
        assert_eq!(store.latest("t").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn new_thread_must_start_at_version_one() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.put(&checkpoint("t", 2, RunStatus::Running)).await.is_err());
        assert!(store.latest("t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let store = InMemoryCheckpointStore::new();
        for v in 1..=4 {
            store.put(&checkpoint("t", v, RunStatus::Running)).await.unwrap();
        }
        let versions: Vec<u64> = store
            .history("t", 2)
            .await
            .unwrap()
            .iter()
            .map(|c| c.version)
            .collect();
        assert_eq!(versions, vec![4, 3]);
        assert!(store.history("missing", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_suspended_uses_latest_status() {
        let store = InMemoryCheckpointStore::new();
        store.put(&checkpoint("a", 1, RunStatus::Suspended)).await.unwrap();
        store.put(&checkpoint("b", 1, RunStatus::Suspended)).await.unwrap();
        store.put(&checkpoint("b", 2, RunStatus::Completed)).await.unwrap();

        let suspended = store.list_suspended().await.unwrap();
        assert_eq!(suspended.len(), 1);
        assert_eq!(suspended[0].thread_id, "a");
    }

    #[tokio::test]
    async fn list_suspended_is_oldest_first() {
        let older = checkpoint("a", 1, RunStatus::Suspended);
        let newer = checkpoint("b", 1, RunStatus::Suspended);
        let store = InMemoryCheckpointStore::new();
        store.put(&newer).await.unwrap();
        store.put(&older).await.unwrap();

        let threads: Vec<String> = store
            .list_suspended()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.thread_id)
            .collect();
        assert_eq!(threads, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = InMemoryCheckpointStore::new();
        let other = store.clone();
        store.put(&checkpoint("t", 1, RunStatus::Running)).await.unwrap();
        assert!(other.latest("t").await.unwrap().is_some());
    }
}
