//! Node identifiers for the question-to-SQL workflow graph.
//!
//! The graph is fixed, so nodes are a closed set of tagged variants rather
//! than registered-by-name strings. Identifiers are persisted inside
//! checkpoints (pending set, join arrivals) using their snake_case names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a node in the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    /// Retrieves schema context, generates the first SQL candidate and a
    /// visualization recommendation.
    GenerateSql,
    /// Checks referenced tables/columns against the retrieved schema.
    ValidateSchema,
    /// Submits the candidate to the query-execution service.
    ValidateExecution,
    /// Join point for both validators; its outbound edge is the retry/proceed router.
    AccuracyGate,
    /// Regenerates SQL with the accumulated validation errors.
    RetryGenerator,
    /// Classifies human feedback into visualization types.
    FeedbackCollector,
    /// Interrupt point waiting for human feedback.
    HumanFeedback,
    /// Graph sink producing the visualization artifact.
    Finalize,
}

impl NodeId {
    /// Every node, in declaration order.
    pub const ALL: [NodeId; 8] = [
        NodeId::GenerateSql,
        NodeId::ValidateSchema,
        NodeId::ValidateExecution,
        NodeId::AccuracyGate,
        NodeId::RetryGenerator,
        NodeId::FeedbackCollector,
        NodeId::HumanFeedback,
        NodeId::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::GenerateSql => "generate_sql",
            NodeId::ValidateSchema => "validate_schema",
            NodeId::ValidateExecution => "validate_execution",
            NodeId::AccuracyGate => "accuracy_gate",
            NodeId::RetryGenerator => "retry_generator",
            NodeId::FeedbackCollector => "feedback_collector",
            NodeId::HumanFeedback => "human_feedback",
            NodeId::Finalize => "finalize",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeId::ALL
            .iter()
            .copied()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| format!("unknown node: '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for node in NodeId::ALL {
            let json = serde_json::to_value(node).unwrap();
            assert_eq!(json.as_str(), Some(node.as_str()));
        }
    }

    #[test]
    fn test_from_str_roundtrips_every_node() {
        for node in NodeId::ALL {
            assert_eq!(node.as_str().parse::<NodeId>().unwrap(), node);
        }
        assert!("nope".parse::<NodeId>().is_err());
    }
}
