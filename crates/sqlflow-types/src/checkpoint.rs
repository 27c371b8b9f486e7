//! Durable, versioned run snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::node::NodeId;
use crate::run::WorkflowRun;

/// Lifecycle status recorded with each checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nodes are pending and none of them is an interrupt point. A run found
    /// in this state after a restart was interrupted mid-flight.
    Running,
    /// Waiting on external input at an interrupt-before node.
    Suspended,
    /// The sink has executed; nothing is pending.
    Completed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Suspended => write!(f, "suspended"),
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "suspended" => Ok(RunStatus::Suspended),
            "completed" => Ok(RunStatus::Completed),
            other => Err(format!("invalid run status: '{other}'")),
        }
    }
}

/// A snapshot of a run plus the nodes that execute next.
///
/// Versions start at 1 for a thread and increase by exactly one per write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// UUIDv7 checkpoint ID.
    pub id: Uuid,
    pub thread_id: String,
    pub version: u64,
    pub status: RunStatus,
    pub run: WorkflowRun,
    /// Nodes ready to execute, in scheduling order.
    pub pending: Vec<NodeId>,
    /// For join nodes with partial arrivals: which predecessors have completed.
    #[serde(default)]
    pub join_arrivals: BTreeMap<NodeId, Vec<NodeId>>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        version: u64,
        status: RunStatus,
        run: WorkflowRun,
        pending: Vec<NodeId>,
        join_arrivals: BTreeMap<NodeId, Vec<NodeId>>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            thread_id: run.thread_id.clone(),
            version,
            status,
            run,
            pending,
            join_arrivals,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Lightweight listing entry for suspended threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub thread_id: String,
    pub version: u64,
    pub status: RunStatus,
    pub pending: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
}

impl From<&Checkpoint> for CheckpointSummary {
    fn from(cp: &Checkpoint) -> Self {
        Self {
            thread_id: cp.thread_id.clone(),
            version: cp.version,
            status: cp.status,
            pending: cp.pending.clone(),
            created_at: cp.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::UserInfo;

    #[test]
    fn test_run_status_roundtrip() {
        for status in [RunStatus::Running, RunStatus::Suspended, RunStatus::Completed] {
            let parsed: RunStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("paused".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_checkpoint_json_roundtrip() {
        let run = WorkflowRun::new("t-1", "how many orders", UserInfo::default(), vec![]);
        let mut arrivals = BTreeMap::new();
        arrivals.insert(NodeId::AccuracyGate, vec![NodeId::ValidateSchema]);
        let cp = Checkpoint::new(
            3,
            RunStatus::Running,
            run,
            vec![NodeId::ValidateExecution],
            arrivals,
        );

        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cp);
        assert_eq!(back.thread_id, "t-1");
        assert!(!back.is_terminal());
    }
}
