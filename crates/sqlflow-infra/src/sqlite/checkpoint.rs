//! SQLite checkpoint store implementation.
//!
//! Implements `CheckpointStore` from `sqlflow-core`. The run, the pending set
//! and the join arrivals are stored as JSON columns; `(thread_id, version)` is
//! the primary key, so a second writer racing for the same version fails on
//! insert even across processes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use sqlflow_core::repository::checkpoint::{CheckpointStore, check_version};
use sqlflow_types::checkpoint::{Checkpoint, CheckpointSummary, RunStatus};
use sqlflow_types::error::RepositoryError;
use sqlflow_types::node::NodeId;
use sqlflow_types::run::WorkflowRun;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CheckpointStore`.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: DatabasePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct CheckpointRow {
    id: String,
    thread_id: String,
    version: i64,
    status: String,
    run: String,
    pending: String,
    join_arrivals: String,
    created_at: String,
}

impl CheckpointRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            thread_id: row.try_get("thread_id")?,
            version: row.try_get("version")?,
            status: row.try_get("status")?,
            run: row.try_get("run")?,
            pending: row.try_get("pending")?,
            join_arrivals: row.try_get("join_arrivals")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_checkpoint(self) -> Result<Checkpoint, RepositoryError> {
        let status: RunStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let run: WorkflowRun = serde_json::from_str(&self.run)
            .map_err(|e| RepositoryError::Query(format!("invalid run JSON: {e}")))?;
        let pending: Vec<NodeId> = serde_json::from_str(&self.pending)
            .map_err(|e| RepositoryError::Query(format!("invalid pending JSON: {e}")))?;
        let join_arrivals: BTreeMap<NodeId, Vec<NodeId>> =
            serde_json::from_str(&self.join_arrivals)
                .map_err(|e| RepositoryError::Query(format!("invalid join_arrivals JSON: {e}")))?;

        Ok(Checkpoint {
            id: parse_uuid(&self.id)?,
            thread_id: self.thread_id,
            version: self.version as u64,
            status,
            run,
            pending,
            join_arrivals,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::Query(format!("serialize {what}: {e}")))
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn rows_to_checkpoints(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Checkpoint>, RepositoryError> {
    let mut checkpoints = Vec::with_capacity(rows.len());
    for row in rows {
        let r = CheckpointRow::from_row(row).map_err(query_error)?;
        checkpoints.push(r.into_checkpoint()?);
    }
    Ok(checkpoints)
}

const SELECT_COLUMNS: &str =
    "c.id, c.thread_id, c.version, c.status, c.run, c.pending, c.join_arrivals, c.created_at";

// ---------------------------------------------------------------------------
// CheckpointStore impl
// ---------------------------------------------------------------------------

impl CheckpointStore for SqliteCheckpointStore {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let run_json = to_json(&checkpoint.run, "run")?;
        let pending_json = to_json(&checkpoint.pending, "pending")?;
        let arrivals_json = to_json(&checkpoint.join_arrivals, "join_arrivals")?;

        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM checkpoints WHERE thread_id = ?")
                .bind(&checkpoint.thread_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(query_error)?;
        check_version(
            &checkpoint.thread_id,
            latest.map(|v| v as u64),
            checkpoint.version,
        )?;

        sqlx::query(
            r#"INSERT INTO checkpoints
               (thread_id, version, id, status, run, pending, join_arrivals, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&checkpoint.thread_id)
        .bind(checkpoint.version as i64)
        .bind(checkpoint.id.to_string())
        .bind(checkpoint.status.to_string())
        .bind(&run_json)
        .bind(&pending_json)
        .bind(&arrivals_json)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
                format!(
                    "thread '{}' already has checkpoint version {}",
                    checkpoint.thread_id, checkpoint.version
                ),
            ),
            _ => query_error(e),
        })?;

        tx.commit().await.map_err(query_error)?;
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM checkpoints c WHERE c.thread_id = ? \
             ORDER BY c.version DESC LIMIT 1"
        ))
        .bind(thread_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = CheckpointRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_checkpoint()?))
            }
            None => Ok(None),
        }
    }

    async fn history(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM checkpoints c WHERE c.thread_id = ? \
             ORDER BY c.version DESC LIMIT ?"
        ))
        .bind(thread_id)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows_to_checkpoints(&rows)
    }

    async fn list_suspended(&self) -> Result<Vec<CheckpointSummary>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"SELECT {SELECT_COLUMNS} FROM checkpoints c
               JOIN (SELECT thread_id, MAX(version) AS version
                     FROM checkpoints GROUP BY thread_id) latest
                 ON latest.thread_id = c.thread_id AND latest.version = c.version
               WHERE c.status = 'suspended'
               ORDER BY c.created_at ASC, c.thread_id ASC"#
        ))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Ok(rows_to_checkpoints(&rows)?
            .iter()
            .map(CheckpointSummary::from)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::{DatabasePool, database_url};
    use sqlflow_types::run::UserInfo;

    async fn test_store() -> SqliteCheckpointStore {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(dir.path());
        std::mem::forget(dir);
        SqliteCheckpointStore::new(DatabasePool::new(&url).await.unwrap())
    }

    fn checkpoint(thread_id: &str, version: u64, status: RunStatus, pending: Vec<NodeId>) -> Checkpoint {
        let mut run = WorkflowRun::new(thread_id, "total sales by month", UserInfo::default(), vec![]);
        run.sql_query = Some("SELECT 1".into());
        Checkpoint::new(version, status, run, pending, BTreeMap::new())
    }

    #[tokio::test]
    async fn test_put_and_latest_round_trip() {
        let store = test_store().await;
        let mut cp = checkpoint("t-1", 1, RunStatus::Running, vec![NodeId::ValidateSchema, NodeId::ValidateExecution]);
        cp.join_arrivals
            .insert(NodeId::AccuracyGate, vec![NodeId::ValidateSchema]);
        store.put(&cp).await.unwrap();

        let loaded = store.latest("t-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, cp.id);
        assert_eq!(loaded.run, cp.run);
        assert_eq!(loaded.pending, cp.pending);
        assert_eq!(loaded.join_arrivals, cp.join_arrivals);
        assert_eq!(loaded.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_put_rejects_stale_and_skipped_versions() {
        let store = test_store().await;
        store
            .put(&checkpoint("t-2", 1, RunStatus::Running, vec![NodeId::GenerateSql]))
            .await
            .unwrap();

        let stale = store
            .put(&checkpoint("t-2", 1, RunStatus::Running, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(stale, RepositoryError::Conflict(_)));

        let skipped = store
            .put(&checkpoint("t-2", 3, RunStatus::Running, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(skipped, RepositoryError::Conflict(_)));

        let first_version = store
            .put(&checkpoint("t-new", 2, RunStatus::Running, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(first_version, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_limited() {
        let store = test_store().await;
        for version in 1..=4 {
            store
                .put(&checkpoint("t-3", version, RunStatus::Running, vec![NodeId::AccuracyGate]))
                .await
                .unwrap();
        }

        let history = store.history("t-3", 3).await.unwrap();
        let versions: Vec<u64> = history.iter().map(|c| c.version).collect();
        assert_eq!(versions, vec![4, 3, 2]);
        assert!(store.history("unknown", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_suspended_only_considers_latest_version() {
        let store = test_store().await;
        store
            .put(&checkpoint("a", 1, RunStatus::Suspended, vec![NodeId::HumanFeedback]))
            .await
            .unwrap();
        store
            .put(&checkpoint("b", 1, RunStatus::Suspended, vec![NodeId::HumanFeedback]))
            .await
            .unwrap();
        store
            .put(&checkpoint("b", 2, RunStatus::Completed, vec![]))
            .await
            .unwrap();

        let suspended = store.list_suspended().await.unwrap();
        assert_eq!(suspended.len(), 1);
        assert_eq!(suspended[0].thread_id, "a");
        assert_eq!(suspended[0].pending, vec![NodeId::HumanFeedback]);
    }

    #[tokio::test]
    async fn test_list_suspended_is_oldest_first() {
        let store = test_store().await;
        let older = checkpoint("a", 1, RunStatus::Suspended, vec![NodeId::HumanFeedback]);
        let newer = checkpoint("b", 1, RunStatus::Suspended, vec![NodeId::HumanFeedback]);
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
}
