//! Node behaviors for the question-to-SQL workflow.
//!
//! `NodeRunner` dispatches on [`NodeId`]. Every behavior reads a run snapshot
//! and returns a [`RunUpdate`] touching only the fields listed by
//! [`declared_writes`]. Dependency failures (embedding, search, generation,
//! execution) are converted into run state here so they never abort a run.

use std::sync::Arc;

use sqlflow_types::config::EngineConfig;
use sqlflow_types::execution::{QueryOutcome, ResultTable};
use sqlflow_types::llm::{
    SQL_QUERY_SCHEMA, SqlQueryResponse, VISUALIZATION_RECOMMENDATION_SCHEMA,
    VISUALIZATION_STATUS_SCHEMA, VisualizationRecommendation, VisualizationStatus,
};
use sqlflow_types::node::NodeId;
use sqlflow_types::run::{ChatMessage, RunField, RunUpdate, WorkflowRun};
use sqlflow_types::schema::SchemaContext;
use sqlflow_types::visualization::{ChartKind, VisualizationArtifact};

use crate::execution::box_executor::BoxQueryExecutor;
use crate::execution::directory::DatabaseDirectory;
use crate::llm::box_generator::BoxTextGenerator;
use crate::schema::retrieval::SchemaRetriever;
use crate::sql::validate_schema;

use super::prompts;

// ---------------------------------------------------------------------------
// Write contracts
// ---------------------------------------------------------------------------

/// Fields each node may write.
pub fn declared_writes(node: NodeId) -> &'static [RunField] {
    use RunField::*;
    match node {
        NodeId::GenerateSql => &[
            SqlQuery,
            SchemaContext,
            VisualizationCandidate,
            AttemptCount,
            FeedbackRounds,
            FeedbackSufficient,
            GenerationError,
        ],
        NodeId::ValidateSchema => &[SchemaValidationStatus, SchemaErrorMessage],
        NodeId::ValidateExecution => &[
            ExecutionValidationStatus,
            ExecutionErrorMessage,
            ResultDataframe,
        ],
        NodeId::AccuracyGate => &[],
        NodeId::RetryGenerator => &[SqlQuery, AttemptCount, GenerationError],
        NodeId::FeedbackCollector => &[FeedbackSufficient, SelectedVisualizationTypes],
        NodeId::HumanFeedback => &[FeedbackRounds],
        NodeId::Finalize => &[Visualization, Messages, SelectedVisualizationTypes],
    }
}

// ---------------------------------------------------------------------------
// NodeError
// ---------------------------------------------------------------------------

/// Failures a node cannot express as run state.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The run lacks an input the node needs.
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    /// A dependency failed in a way the node does not convert.
    #[error("dependency failed: {0}")]
    Dependency(String),
}

// ---------------------------------------------------------------------------
// NodeServices / NodeRunner
// ---------------------------------------------------------------------------

/// External collaborators injected into node behaviors.
#[derive(Clone)]
pub struct NodeServices {
    pub generator: Arc<BoxTextGenerator>,
    pub retriever: Arc<SchemaRetriever>,
    pub executor: Arc<BoxQueryExecutor>,
    pub directory: Arc<dyn DatabaseDirectory>,
}

/// Executes node behaviors against run snapshots.
pub struct NodeRunner {
    services: NodeServices,
    config: EngineConfig,
}

impl NodeRunner {
    pub fn new(services: NodeServices, config: EngineConfig) -> Self {
        Self { services, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one node against a snapshot and return its partial update.
    pub async fn run(&self, node: NodeId, run: &WorkflowRun) -> Result<RunUpdate, NodeError> {
        match node {
            NodeId::GenerateSql => self.generate_sql(run).await,
            NodeId::ValidateSchema => Ok(Self::validate_schema(run)),
            NodeId::ValidateExecution => Ok(self.validate_execution(run).await),
            NodeId::AccuracyGate => Ok(RunUpdate::none()),
            NodeId::RetryGenerator => self.retry_generator(run).await,
            NodeId::FeedbackCollector => Ok(self.feedback_collector(run).await),
            NodeId::HumanFeedback => Ok(Self::human_feedback(run)),
            NodeId::Finalize => Ok(Self::finalize(run)),
        }
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    async fn generate_sql(&self, run: &WorkflowRun) -> Result<RunUpdate, NodeError> {
        let question = run.question().ok_or(NodeError::MissingInput("question"))?;
        let database = run
            .primary_database()
            .ok_or(NodeError::MissingInput("selected database"))?;

        let mut update = RunUpdate {
            attempt_count: Some(1),
            feedback_rounds: Some(0),
            feedback_sufficient: Some(false),
            ..Default::default()
        };

        let schema = match self
            .services
            .retriever
            .retrieve(run.client_name(), database, question)
            .await
        {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!(thread_id = %run.thread_id, error = %e, "schema retrieval failed");
                update.sql_query = Some(None);
                update.schema_context = Some(SchemaContext::default());
                update.visualization_candidate = Some(None);
                update.generation_error = Some(Some(format!("schema retrieval failed: {e}")));
                return Ok(update);
            }
        };

        let generated: Result<SqlQueryResponse, _> = self
            .services
            .generator
            .generate_as(
                SQL_QUERY_SCHEMA,
                prompts::SQL_GENERATION_SYSTEM,
                &prompts::sql_generation(question, &schema),
            )
            .await;

        let sql = match generated {
            Ok(response) => response.sql_query,
            Err(e) => {
                tracing::warn!(thread_id = %run.thread_id, error = %e, "sql generation failed");
                update.sql_query = Some(None);
                update.schema_context = Some(schema);
                update.visualization_candidate = Some(None);
                update.generation_error = Some(Some(format!("sql generation failed: {e}")));
                return Ok(update);
            }
        };

        let candidate = self.recommend_visualization(run, question, &sql).await;

        tracing::debug!(thread_id = %run.thread_id, tables = schema.tables.len(), "generated sql");
        update.sql_query = Some(Some(sql));
        update.schema_context = Some(schema);
        update.visualization_candidate = Some(candidate);
        update.generation_error = Some(None);
        Ok(update)
    }

    async fn recommend_visualization(
        &self,
        run: &WorkflowRun,
        question: &str,
        sql: &str,
    ) -> Option<VisualizationRecommendation> {
        self.services
            .generator
            .generate_as(
                VISUALIZATION_RECOMMENDATION_SCHEMA,
                prompts::VISUALIZATION_SYSTEM,
                &prompts::visualization(question, sql),
            )
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    thread_id = %run.thread_id,
                    error = %e,
                    "visualization recommendation failed"
                );
            })
            .ok()
    }

    async fn retry_generator(&self, run: &WorkflowRun) -> Result<RunUpdate, NodeError> {
        let question = run.question().ok_or(NodeError::MissingInput("question"))?;
        let next_attempt = run.attempt_count + 1;

        let mut errors: Vec<&str> = run.validation_errors();
        if let Some(generation_error) = run.generation_error.as_deref() {
            errors.push(generation_error);
        }
        let errors = errors.join("\n");
        let failing_sql = run.sql_query.as_deref().unwrap_or("");

        let generated: Result<SqlQueryResponse, _> = self
            .services
            .generator
            .generate_as(
                SQL_QUERY_SCHEMA,
                prompts::SQL_CORRECTION_SYSTEM,
                &prompts::sql_correction(question, &run.schema_context, failing_sql, &errors),
            )
            .await;

        tracing::info!(
            thread_id = %run.thread_id,
            attempt = next_attempt,
            succeeded = generated.is_ok(),
            "regenerated sql"
        );

        Ok(match generated {
            Ok(response) => RunUpdate {
                sql_query: Some(Some(response.sql_query)),
                attempt_count: Some(next_attempt),
                generation_error: Some(None),
                ..Default::default()
            },
            Err(e) => RunUpdate {
                attempt_count: Some(next_attempt),
                generation_error: Some(Some(format!("sql correction failed: {e}"))),
                ..Default::default()
            },
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    fn validate_schema(run: &WorkflowRun) -> RunUpdate {
        let (status, message) = match run.sql_query.as_deref() {
            None => (false, Some(missing_sql_message(run))),
            Some(sql) => {
                let result = validate_schema(
                    sql,
                    &run.schema_context.tables,
                    &run.schema_context.columns,
                );
                (result.valid, result.message)
            }
        };
        RunUpdate {
            schema_validation_status: Some(status),
            schema_error_message: Some(message),
            ..Default::default()
        }
    }

    async fn validate_execution(&self, run: &WorkflowRun) -> RunUpdate {
        let failed = |message: String| RunUpdate {
            execution_validation_status: Some(false),
            execution_error_message: Some(Some(message)),
            result_dataframe: Some(None),
            ..Default::default()
        };

        let Some(sql) = run.sql_query.as_deref() else {
            return failed(missing_sql_message(run));
        };
        let client = run.client_name();
        let database = run.primary_database().unwrap_or_default();
        let Some(database_id) = self.services.directory.resolve(client, database) else {
            return failed(format!(
                "No execution database configured for client '{client}' and database '{database}'"
            ));
        };

        match self.services.executor.execute(database_id, sql).await {
            Ok(QueryOutcome::Rows(table)) => {
                tracing::debug!(
                    thread_id = %run.thread_id,
                    database_id,
                    rows = table.row_count(),
                    "execution check passed"
                );
                RunUpdate {
                    execution_validation_status: Some(true),
                    execution_error_message: Some(None),
                    result_dataframe: Some(Some(table.to_records_json())),
                    ..Default::default()
                }
            }
            Ok(QueryOutcome::Error(message)) => failed(message),
            Err(e) => {
                tracing::warn!(thread_id = %run.thread_id, error = %e, "execution service failed");
                failed(e.to_string())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Feedback
    // -----------------------------------------------------------------------

    async fn feedback_collector(&self, run: &WorkflowRun) -> RunUpdate {
        if run.feedback_sufficient {
            return RunUpdate::none();
        }
        let Some(feedback) = run
            .human_feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
        else {
            return RunUpdate::none();
        };

        let classified: Result<VisualizationStatus, _> = self
            .services
            .generator
            .generate_as(
                VISUALIZATION_STATUS_SCHEMA,
                prompts::FEEDBACK_SYSTEM,
                &prompts::feedback_classification(feedback, run.sql_query.as_deref()),
            )
            .await;

        let status = match classified {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(thread_id = %run.thread_id, error = %e, "feedback classification failed");
                return RunUpdate {
                    feedback_sufficient: Some(false),
                    ..Default::default()
                };
            }
        };

        let types = normalize_chart_labels(&status.selected_visualization_types);
        let sufficient = status.visualization_status && !types.is_empty();
        tracing::debug!(thread_id = %run.thread_id, sufficient, ?types, "classified feedback");

        if sufficient {
            RunUpdate {
                feedback_sufficient: Some(true),
                selected_visualization_types: Some(types),
                ..Default::default()
            }
        } else {
            RunUpdate {
                feedback_sufficient: Some(false),
                ..Default::default()
            }
        }
    }

    fn human_feedback(run: &WorkflowRun) -> RunUpdate {
        RunUpdate {
            feedback_rounds: Some(run.feedback_rounds + 1),
            ..Default::default()
        }
    }

    // -----------------------------------------------------------------------
    // Finalize
    // -----------------------------------------------------------------------

    fn finalize(run: &WorkflowRun) -> RunUpdate {
        let requested: &[String] = if run.feedback_sufficient {
            &run.selected_visualization_types
        } else {
            run.visualization_candidate
                .as_ref()
                .map(|c| c.recommended_visualization.as_slice())
                .unwrap_or_default()
        };
        let chart_types = chart_kinds(requested);

        let (columns, row_count) = run
            .result_dataframe
            .as_deref()
            .map(describe_records)
            .unwrap_or_default();

        let mut validation_warnings: Vec<String> = run
            .validation_errors()
            .into_iter()
            .map(str::to_string)
            .collect();
        if let Some(generation_error) = &run.generation_error {
            validation_warnings.push(generation_error.clone());
        }

        let artifact = VisualizationArtifact {
            chart_types,
            sql_query: run.sql_query.clone(),
            columns,
            row_count,
            validation_warnings,
            description: run
                .visualization_candidate
                .as_ref()
                .map(|c| c.description.clone()),
        };

        let labels: Vec<String> = artifact
            .chart_types
            .iter()
            .map(|k| k.label().to_string())
            .collect();
        let summary = summary_message(&artifact, &labels);

        RunUpdate {
            append_messages: vec![ChatMessage::assistant(summary)],
            selected_visualization_types: Some(labels),
            visualization: Some(Some(artifact)),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn missing_sql_message(run: &WorkflowRun) -> String {
    match &run.generation_error {
        Some(e) => format!("No SQL query to validate: {e}"),
        None => "No SQL query to validate".to_string(),
    }
}

/// Map free-form chart names to canonical labels, dropping unknown ones and
/// duplicates.
fn normalize_chart_labels(raw: &[String]) -> Vec<String> {
    chart_kinds(raw)
        .into_iter()
        .map(|k| k.label().to_string())
        .collect()
}

fn chart_kinds(raw: &[String]) -> Vec<ChartKind> {
    let mut kinds = Vec::new();
    for kind in raw.iter().filter_map(|s| s.parse::<ChartKind>().ok()) {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

/// Column names and row count of a serialized result table.
fn describe_records(records_json: &str) -> (Vec<String>, usize) {
    match ResultTable::from_records_json(records_json) {
        Ok(table) => {
            let row_count = table.row_count();
            (table.columns, row_count)
        }
        Err(e) => {
            tracing::warn!(error = %e, "stored result table is unreadable");
            (Vec::new(), 0)
        }
    }
}

fn summary_message(artifact: &VisualizationArtifact, labels: &[String]) -> String {
    let charts = if labels.is_empty() {
        "a table".to_string()
    } else {
        labels.join(", ")
    };
    let mut message = format!(
        "Prepared {charts} over {} row(s).",
        artifact.row_count
    );
    if !artifact.is_validated() {
        message.push_str(" The query did not pass validation: ");
        message.push_str(&artifact.validation_warnings.join("; "));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlflow_types::llm::VisualizationRecommendation;
    use serde_json::json;
    use sqlflow_types::run::UserInfo;

    fn run() -> WorkflowRun {
        WorkflowRun::new("t", "total sales by month", UserInfo::default(), vec![])
    }

    #[test]
    fn every_node_has_a_write_contract() {
        for node in NodeId::ALL {
            let declared = declared_writes(node);
            assert_eq!(
                declared.is_empty(),
                node == NodeId::AccuracyGate,
                "{node} write set"
            );
        }

        let mut r = run();
        r.sql_query = Some("SELECT amount FROM sales".into());
        r.visualization_candidate = Some(VisualizationRecommendation {
            recommended_visualization: vec!["bar".into()],
            description: "totals".into(),
        });
        let updates = [
            (NodeId::ValidateSchema, NodeRunner::validate_schema(&r)),
            (NodeId::HumanFeedback, NodeRunner::human_feedback(&r)),
            (NodeId::Finalize, NodeRunner::finalize(&r)),
        ];
        for (node, update) in updates {
            let written = update.fields();
            assert!(!written.is_empty(), "{node} wrote nothing");
            for field in written {
                assert!(
                    declared_writes(node).contains(&field),
                    "{node} wrote undeclared {field:?}"
                );
            }
        }
    }

    #[test]
    fn schema_validation_without_sql_reports_generation_error() {
        let mut r = run();
        r.generation_error = Some("sql generation failed: 503".into());
        let update = NodeRunner::validate_schema(&r);
        assert_eq!(update.schema_validation_status, Some(false));
        let message = update.schema_error_message.flatten().unwrap();
        assert!(message.contains("503"));
    }

    #[test]
    fn human_feedback_increments_rounds() {
        let mut r = run();
        r.feedback_rounds = 2;
        let update = NodeRunner::human_feedback(&r);
        assert_eq!(update.feedback_rounds, Some(3));
        assert_eq!(update.fields(), vec![RunField::FeedbackRounds]);
    }

    #[test]
    fn finalize_prefers_human_selection() {
        let mut r = run();
        r.sql_query = Some("SELECT 1".into());
        r.feedback_sufficient = true;
        r.selected_visualization_types = vec!["pie chart".into()];
        r.visualization_candidate = Some(VisualizationRecommendation {
            recommended_visualization: vec!["bar chart".into()],
            description: "monthly totals".into(),
        });
        r.result_dataframe = Some(
            ResultTable {
                columns: vec!["total".into(), "month".into()],
                rows: vec![vec![json!(10), json!("2024-01")]],
            }
            .to_records_json(),
        );
        r.schema_validation_status = true;
        r.execution_validation_status = true;

        let update = NodeRunner::finalize(&r);
        let artifact = update.visualization.clone().flatten().unwrap();
        assert_eq!(artifact.chart_types, vec![ChartKind::Pie]);
        assert_eq!(artifact.row_count, 1);
        assert_eq!(artifact.columns, vec!["total", "month"]);
        assert!(artifact.is_validated());
        assert_eq!(update.append_messages.len(), 1);
    }

    #[test]
    fn finalize_falls_back_to_recommendation_and_surfaces_warnings() {
        let mut r = run();
        r.visualization_candidate = Some(VisualizationRecommendation {
            recommended_visualization: vec!["Line Chart".into(), "line".into()],
            description: "trend".into(),
        });
        r.schema_error_message = Some("Tables not found in predefined tables: orders".into());

        let update = NodeRunner::finalize(&r);
        let artifact = update.visualization.clone().flatten().unwrap();
        assert_eq!(artifact.chart_types, vec![ChartKind::Line]);
        assert_eq!(artifact.validation_warnings.len(), 1);
        assert!(update.append_messages[0].content.contains("orders"));
        assert_eq!(
            update.selected_visualization_types,
            Some(vec!["line chart".to_string()])
        );
    }

    #[test]
    fn finalize_keeps_header_of_empty_result() {
        let mut r = run();
        r.result_dataframe = Some(
            ResultTable {
                columns: vec!["region".into(), "amount".into()],
                rows: Vec::new(),
            }
            .to_records_json(),
        );

        let artifact = NodeRunner::finalize(&r).visualization.flatten().unwrap();
        assert_eq!(artifact.columns, vec!["region", "amount"]);
        assert_eq!(artifact.row_count, 0);
    }

    #[test]
    fn chart_labels_are_normalized_and_deduplicated() {
        let raw = vec!["Pie".to_string(), "pie chart".to_string(), "radar".to_string()];
        assert_eq!(normalize_chart_labels(&raw), vec!["pie chart"]);
    }
}
