//! Schema context retrieved from the vector index for one question.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single nearest-neighbor hit returned by a schema index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaHit {
    pub id: String,
    pub score: f32,
    pub payload: Value,
}

/// One table description extracted from a hit payload.
///
/// Payloads carry an `original_data` object shaped as
/// `{"Table Name": "..", "Columns": [{"Column Name": ".."}, ..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDocument {
    pub table_name: String,
    pub columns: Vec<String>,
}

impl TableDocument {
    /// Extract the table description from a hit payload.
    ///
    /// Returns an error describing the first missing piece when the payload is
    /// not shaped as expected. Column entries without a name are skipped.
    pub fn from_payload(payload: &Value) -> Result<Self, String> {
        let original = payload
            .get("original_data")
            .ok_or_else(|| "payload has no 'original_data'".to_string())?;
        let table_name = original
            .get("Table Name")
            .and_then(Value::as_str)
            .ok_or_else(|| "'original_data' has no 'Table Name'".to_string())?
            .to_string();
        let columns = original
            .get("Columns")
            .and_then(Value::as_array)
            .ok_or_else(|| format!("table '{table_name}' has no 'Columns' list"))?
            .iter()
            .filter_map(|c| c.get("Column Name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        Ok(Self {
            table_name,
            columns,
        })
    }
}

/// Tables and columns known for a question, plus the raw documents that were
/// shown to the text generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaContext {
    pub documents: Vec<Value>,
    pub tables: Vec<String>,
    pub columns: Vec<String>,
}

impl SchemaContext {
    /// Build a context from parsed table documents, de-duplicating names while
    /// keeping first-seen order.
    pub fn from_documents(raw: Vec<Value>, tables: &[TableDocument]) -> Self {
        let mut ctx = Self {
            documents: raw,
            ..Default::default()
        };
        for table in tables {
            if !ctx.tables.contains(&table.table_name) {
                ctx.tables.push(table.table_name.clone());
            }
            for column in &table.columns {
                if !ctx.columns.contains(column) {
                    ctx.columns.push(column.clone());
                }
            }
        }
        ctx
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty()
    }

    /// Compact JSON rendering for prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.documents).unwrap_or_else(|_| "[]".to_string())
    }
}
