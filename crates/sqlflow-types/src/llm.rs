//! Text-generation request/response shapes.
//!
//! The workflow talks to a text generator through constrained, structured
//! output: every call names a [`ResponseSchema`] and gets back a JSON object
//! that is then deserialized into one of the response structs below.

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from text-generation and embedding backends.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A named JSON Schema the generator's output must conform to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

impl ResponseSchema {
    /// Derive the schema from a Rust type.
    pub fn of<T: JsonSchema>(name: impl Into<String>) -> Self {
        let schema = serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null);
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// `{sql_query: string}` -- generation and correction output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SqlQueryResponse {
    /// A single SQL statement answering the question.
    pub sql_query: String,
}

/// Visualization drafted at generation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisualizationRecommendation {
    /// One or more of: bar chart, line chart, numeric indicator, pie chart, scatter chart.
    pub recommended_visualization: Vec<String>,
    /// Short explanation of why these charts fit the data.
    pub description: String,
}

/// Feedback classification: did the human name a visualization type?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisualizationStatus {
    pub visualization_status: bool,
    #[serde(default)]
    pub selected_visualization_types: Vec<String>,
}

pub const SQL_QUERY_SCHEMA: &str = "sql_query";
pub const VISUALIZATION_RECOMMENDATION_SCHEMA: &str = "visualization_recommendation";
pub const VISUALIZATION_STATUS_SCHEMA: &str = "visualization_status";
