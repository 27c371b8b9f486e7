//! Workflow run state and partial updates.
//!
//! `WorkflowRun` is the unit of execution addressed by a `thread_id`. Nodes
//! never mutate it directly: each returns a [`RunUpdate`] naming only the
//! fields it writes, which the engine checks against the node's declared
//! write set before merging (last writer wins per field).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::llm::VisualizationRecommendation;
use crate::node::NodeId;
use crate::schema::SchemaContext;
use crate::visualization::VisualizationArtifact;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Author of a chat message in the run's message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::Human => write!(f, "human"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry in the run's ordered chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// The person asking the question. `user_name` doubles as the client name
/// used to resolve vector collections and execution databases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A database the user selected for this question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSelection {
    pub database_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A node failure recorded by the engine instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node: NodeId,
    pub attempt: u32,
    pub error: String,
}

// ---------------------------------------------------------------------------
// WorkflowRun
// ---------------------------------------------------------------------------

/// All intermediate state of one question-to-SQL run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub thread_id: String,
    pub messages: Vec<ChatMessage>,
    pub user_info: UserInfo,
    pub selected_databases: Vec<DatabaseSelection>,
    pub sql_query: Option<String>,
    #[serde(default)]
    pub schema_context: SchemaContext,
    /// Starts at 1, incremented by each retry, bounded by `EngineConfig::max_attempts`.
    pub attempt_count: u32,
    #[serde(default)]
    pub schema_validation_status: bool,
    #[serde(default)]
    pub schema_error_message: Option<String>,
    #[serde(default)]
    pub execution_validation_status: bool,
    #[serde(default)]
    pub execution_error_message: Option<String>,
    /// Query result serialized as JSON records.
    #[serde(default)]
    pub result_dataframe: Option<String>,
    #[serde(default)]
    pub visualization_candidate: Option<VisualizationRecommendation>,
    /// Last dependency failure seen while generating or correcting SQL.
    #[serde(default)]
    pub generation_error: Option<String>,
    #[serde(default)]
    pub human_feedback: Option<String>,
    #[serde(default)]
    pub feedback_rounds: u32,
    #[serde(default)]
    pub feedback_sufficient: bool,
    #[serde(default)]
    pub selected_visualization_types: Vec<String>,
    #[serde(default)]
    pub visualization: Option<VisualizationArtifact>,
    /// Engine-owned; nodes cannot write it.
    #[serde(default)]
    pub node_failures: Vec<NodeFailure>,
}

impl WorkflowRun {
    /// Create a fresh run for a question.
    pub fn new(
        thread_id: impl Into<String>,
        question: impl Into<String>,
        user_info: UserInfo,
        selected_databases: Vec<DatabaseSelection>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: vec![ChatMessage::human(question)],
            user_info,
            selected_databases,
            sql_query: None,
            schema_context: SchemaContext::default(),
            attempt_count: 1,
            schema_validation_status: false,
            schema_error_message: None,
            execution_validation_status: false,
            execution_error_message: None,
            result_dataframe: None,
            visualization_candidate: None,
            generation_error: None,
            human_feedback: None,
            feedback_rounds: 0,
            feedback_sufficient: false,
            selected_visualization_types: Vec::new(),
            visualization: None,
            node_failures: Vec::new(),
        }
    }

    /// The natural-language question: the first human message.
    pub fn question(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::Human)
            .map(|m| m.content.as_str())
    }

    /// Client name as used for collection and database lookups.
    pub fn client_name(&self) -> &str {
        &self.user_info.user_name
    }

    /// The database the question targets (the first selection).
    pub fn primary_database(&self) -> Option<&str> {
        self.selected_databases
            .first()
            .map(|d| d.database_name.as_str())
    }

    /// Both validators passed for the current candidate.
    pub fn is_validated(&self) -> bool {
        self.schema_validation_status && self.execution_validation_status
    }

    /// Outstanding validation messages, schema first.
    pub fn validation_errors(&self) -> Vec<&str> {
        [
            self.schema_error_message.as_deref(),
            self.execution_error_message.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

// ---------------------------------------------------------------------------
// RunField / RunUpdate
// ---------------------------------------------------------------------------

/// A node-writable field of [`WorkflowRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunField {
    Messages,
    SqlQuery,
    SchemaContext,
    AttemptCount,
    SchemaValidationStatus,
    SchemaErrorMessage,
    ExecutionValidationStatus,
    ExecutionErrorMessage,
    ResultDataframe,
    VisualizationCandidate,
    GenerationError,
    HumanFeedback,
    FeedbackRounds,
    FeedbackSufficient,
    SelectedVisualizationTypes,
    Visualization,
}

impl fmt::Display for RunField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| format!("{self:?}"));
        f.write_str(&name)
    }
}

/// Partial update returned by a node.
///
/// `None` means "not written". Nullable run fields use `Option<Option<T>>` so
/// a node can explicitly clear them. Messages are appended, not replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunUpdate {
    pub append_messages: Vec<ChatMessage>,
    pub sql_query: Option<Option<String>>,
    pub schema_context: Option<SchemaContext>,
    pub attempt_count: Option<u32>,
    pub schema_validation_status: Option<bool>,
    pub schema_error_message: Option<Option<String>>,
    pub execution_validation_status: Option<bool>,
    pub execution_error_message: Option<Option<String>>,
    pub result_dataframe: Option<Option<String>>,
    pub visualization_candidate: Option<Option<VisualizationRecommendation>>,
    pub generation_error: Option<Option<String>>,
    pub human_feedback: Option<Option<String>>,
    pub feedback_rounds: Option<u32>,
    pub feedback_sufficient: Option<bool>,
    pub selected_visualization_types: Option<Vec<String>>,
    pub visualization: Option<Option<VisualizationArtifact>>,
}

impl RunUpdate {
    /// An update that writes nothing (pass-through nodes).
    pub fn none() -> Self {
        Self::default()
    }

    /// The fields this update writes, in declaration order.
    pub fn fields(&self) -> Vec<RunField> {
        let mut fields = Vec::new();
        if !self.append_messages.is_empty() {
            fields.push(RunField::Messages);
        }
        let flags = [
            (self.sql_query.is_some(), RunField::SqlQuery),
            (self.schema_context.is_some(), RunField::SchemaContext),
            (self.attempt_count.is_some(), RunField::AttemptCount),
            (self.schema_validation_status.is_some(), RunField::SchemaValidationStatus),
            (self.schema_error_message.is_some(), RunField::SchemaErrorMessage),
            (self.execution_validation_status.is_some(), RunField::ExecutionValidationStatus),
            (self.execution_error_message.is_some(), RunField::ExecutionErrorMessage),
            (self.result_dataframe.is_some(), RunField::ResultDataframe),
            (self.visualization_candidate.is_some(), RunField::VisualizationCandidate),
            (self.generation_error.is_some(), RunField::GenerationError),
            (self.human_feedback.is_some(), RunField::HumanFeedback),
            (self.feedback_rounds.is_some(), RunField::FeedbackRounds),
            (self.feedback_sufficient.is_some(), RunField::FeedbackSufficient),
            (
                self.selected_visualization_types.is_some(),
                RunField::SelectedVisualizationTypes,
            ),
            (self.visualization.is_some(), RunField::Visualization),
        ];
        fields.extend(flags.into_iter().filter(|(set, _)| *set).map(|(_, f)| f));
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Merge this update into a run. Written fields replace the run's values.
    pub fn apply_to(self, run: &mut WorkflowRun) {
        run.messages.extend(self.append_messages);
        if let Some(v) = self.sql_query {
            run.sql_query = v;
        }
        if let Some(v) = self.schema_context {
            run.schema_context = v;
        }
        if let Some(v) = self.attempt_count {
            run.attempt_count = v;
        }
        if let Some(v) = self.schema_validation_status {
            run.schema_validation_status = v;
        }
        if let Some(v) = self.schema_error_message {
            run.schema_error_message = v;
        }
        if let Some(v) = self.execution_validation_status {
            run.execution_validation_status = v;
        }
        if let Some(v) = self.execution_error_message {
            run.execution_error_message = v;
        }
        if let Some(v) = self.result_dataframe {
            run.result_dataframe = v;
        }
        if let Some(v) = self.visualization_candidate {
            run.visualization_candidate = v;
        }
        if let Some(v) = self.generation_error {
            run.generation_error = v;
        }
        if let Some(v) = self.human_feedback {
            run.human_feedback = v;
        }
        if let Some(v) = self.feedback_rounds {
            run.feedback_rounds = v;
        }
        if let Some(v) = self.feedback_sufficient {
            run.feedback_sufficient = v;
        }
        if let Some(v) = self.selected_visualization_types {
            run.selected_visualization_types = v;
        }
        if let Some(v) = self.visualization {
            run.visualization = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_run() -> WorkflowRun {
        WorkflowRun::new(
            "thread-1",
            "total sales by month",
            UserInfo {
                user_name: "Acme Corp".to_string(),
                email: Some("ops@acme.test".to_string()),
            },
            vec![DatabaseSelection {
                database_name: "warehouse".to_string(),
                description: None,
            }],
        )
    }

    #[test]
    fn test_new_run_starts_at_first_attempt() {
        let run = sample_run();
        assert_eq!(run.attempt_count, 1);
        assert_eq!(run.question(), Some("total sales by month"));
        assert_eq!(run.primary_database(), Some("warehouse"));
        assert!(!run.feedback_sufficient);
    }

    #[test]
    fn test_empty_update_writes_nothing() {
        assert!(RunUpdate::none().is_empty());
        assert!(RunUpdate::none().fields().is_empty());
    }

    #[test]
    fn test_fields_lists_only_written_fields() {
        let update = RunUpdate {
            schema_validation_status: Some(false),
            schema_error_message: Some(Some("missing".to_string())),
            ..Default::default()
        };
        assert_eq!(
            update.fields(),
            vec![RunField::SchemaValidationStatus, RunField::SchemaErrorMessage]
        );
    }

    #[test]
    fn test_apply_can_clear_nullable_fields() {
        let mut run = sample_run();
        run.result_dataframe = Some("[]".to_string());

        RunUpdate {
            result_dataframe: Some(None),
            execution_validation_status: Some(false),
            ..Default::default()
        }
        .apply_to(&mut run);

        assert!(run.result_dataframe.is_none());
        assert!(!run.execution_validation_status);
    }

    #[test]
    fn test_apply_appends_messages() {
        let mut run = sample_run();
        RunUpdate {
            append_messages: vec![ChatMessage::human("show it as a pie chart")],
            ..Default::default()
        }
        .apply_to(&mut run);
        assert_eq!(run.messages.len(), 2);
        assert_eq!(run.question(), Some("total sales by month"));
    }

    #[test]
    fn test_validation_errors_schema_first() {
        let mut run = sample_run();
        run.schema_error_message = Some("schema".to_string());
        run.execution_error_message = Some("exec".to_string());
        assert_eq!(run.validation_errors(), vec!["schema", "exec"]);
    }

    #[test]
    fn test_run_field_display_is_snake_case() {
        assert_eq!(RunField::SchemaErrorMessage.to_string(), "schema_error_message");
    }
}
