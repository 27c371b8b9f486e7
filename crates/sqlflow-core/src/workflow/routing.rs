//! Conditional routing functions.
//!
//! Each router inspects the merged run after its source node completed and
//! returns exactly one of the targets declared for that edge in the graph.

use sqlflow_types::config::EngineConfig;
use sqlflow_types::node::NodeId;
use sqlflow_types::run::WorkflowRun;

/// A routing function over run state.
pub type Router = fn(&WorkflowRun, &EngineConfig) -> NodeId;

/// Accuracy gate: proceed once both validators passed or the attempt bound is
/// reached, otherwise retry generation.
///
/// Reaching [`NodeId::FeedbackCollector`] does not imply a valid query; the
/// outstanding messages stay on the run.
pub fn route_accuracy_gate(run: &WorkflowRun, config: &EngineConfig) -> NodeId {
    if run.attempt_count >= config.max_attempts || run.is_validated() {
        NodeId::FeedbackCollector
    } else {
        NodeId::RetryGenerator
    }
}

/// After classification: finalize when feedback named a chart type or the
/// feedback round bound is exhausted, otherwise wait for (more) feedback.
pub fn route_feedback_collector(run: &WorkflowRun, config: &EngineConfig) -> NodeId {
    if run.feedback_sufficient || feedback_rounds_exhausted(run, config) {
        NodeId::Finalize
    } else {
        NodeId::HumanFeedback
    }
}

/// After human input: classify it unless a type is already settled.
///
/// The collector already sends sufficient feedback to finalize, so the
/// `Finalize` arm only fires for a checkpoint stored suspended at
/// `human_feedback` with the type settled, as left by an interrupted or
/// externally written run.
pub fn route_human_feedback(run: &WorkflowRun, _config: &EngineConfig) -> NodeId {
    if run.feedback_sufficient {
        NodeId::Finalize
    } else {
        NodeId::FeedbackCollector
    }
}

fn feedback_rounds_exhausted(run: &WorkflowRun, config: &EngineConfig) -> bool {
    config
        .feedback_round_limit()
        .is_some_and(|limit| run.feedback_rounds >= limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlflow_types::run::UserInfo;

    fn run() -> WorkflowRun {
        WorkflowRun::new("t", "q", UserInfo::default(), vec![])
    }

    #[test]
    fn gate_retries_first_failed_attempt() {
        let mut r = run();
        r.schema_validation_status = false;
        r.execution_validation_status = true;
        assert_eq!(
            route_accuracy_gate(&r, &EngineConfig::default()),
            NodeId::RetryGenerator
        );
    }

    #[test]
    fn gate_proceeds_when_both_validators_pass() {
        let mut r = run();
        r.schema_validation_status = true;
        r.execution_validation_status = true;
        assert_eq!(
            route_accuracy_gate(&r, &EngineConfig::default()),
            NodeId::FeedbackCollector
        );
    }

    #[test]
    fn gate_proceeds_at_attempt_bound_regardless_of_status() {
        let mut r = run();
        r.attempt_count = 2;
        assert_eq!(
            route_accuracy_gate(&r, &EngineConfig::default()),
            NodeId::FeedbackCollector
        );
    }

    #[test]
    fn collector_waits_for_feedback_until_sufficient() {
        let mut r = run();
        let config = EngineConfig::default();
        assert_eq!(route_feedback_collector(&r, &config), NodeId::HumanFeedback);
        r.feedback_sufficient = true;
        assert_eq!(route_feedback_collector(&r, &config), NodeId::Finalize);
    }

    #[test]
    fn collector_finalizes_when_rounds_exhausted() {
        let mut r = run();
        let config = EngineConfig {
            max_feedback_rounds: 2,
            ..Default::default()
        };
        r.feedback_rounds = 1;
        assert_eq!(route_feedback_collector(&r, &config), NodeId::HumanFeedback);
        r.feedback_rounds = 2;
        assert_eq!(route_feedback_collector(&r, &config), NodeId::Finalize);
    }

    #[test]
    fn unbounded_feedback_never_exhausts() {
        let mut r = run();
        let config = EngineConfig {
            max_feedback_rounds: 0,
            ..Default::default()
        };
        r.feedback_rounds = 1_000;
        assert_eq!(route_feedback_collector(&r, &config), NodeId::HumanFeedback);
    }

    #[test]
    fn human_feedback_loops_back_while_insufficient() {
        let mut r = run();
        let config = EngineConfig::default();
        assert_eq!(route_human_feedback(&r, &config), NodeId::FeedbackCollector);
        r.feedback_sufficient = true;
        assert_eq!(route_human_feedback(&r, &config), NodeId::Finalize);
    }
}
