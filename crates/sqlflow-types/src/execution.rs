//! Query-execution payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Tabular result materialized from an execution response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Serialize as `{"columns": [...], "records": [...]}`, with each record
    /// an object keyed by column name.
    ///
    /// `columns` keeps the service's column order, which the record objects
    /// lose, and survives an empty result. Rows shorter than the header yield
    /// `null` for the missing cells; extra cells are dropped.
    pub fn to_records_json(&self) -> String {
        let records: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut obj = Map::with_capacity(self.columns.len());
                for (i, col) in self.columns.iter().enumerate() {
                    obj.insert(col.clone(), row.get(i).cloned().unwrap_or(Value::Null));
                }
                Value::Object(obj)
            })
            .collect();
        json!({ "columns": self.columns, "records": records }).to_string()
    }

    /// Inverse of [`to_records_json`](Self::to_records_json).
    pub fn from_records_json(json: &str) -> Result<Self, serde_json::Error> {
        let envelope: RecordsEnvelope = serde_json::from_str(json)?;
        let rows = envelope
            .records
            .iter()
            .map(|record| {
                envelope
                    .columns
                    .iter()
                    .map(|col| record.get(col).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Ok(Self {
            columns: envelope.columns,
            rows,
        })
    }
}

#[derive(Deserialize)]
struct RecordsEnvelope {
    columns: Vec<String>,
    #[serde(default)]
    records: Vec<Map<String, Value>>,
}

/// Structural outcome of running a query on the execution service.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(ResultTable),
    /// The service accepted the request but reported a query error.
    Error(String),
}

/// Transport-level failures talking to the execution service.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("execution service unreachable: {0}")]
    Transport(String),

    #[error("authentication with execution service failed: {0}")]
    Auth(String),

    #[error("malformed execution response: {0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_json_keys_by_column() {
        let table = ResultTable {
            columns: vec!["month".into(), "total".into()],
            rows: vec![vec![json!("2024-01"), json!(120.5)], vec![json!("2024-02")]],
        };
        let parsed: Value = serde_json::from_str(&table.to_records_json()).unwrap();
        assert_eq!(
            parsed["records"],
            json!([
                {"month": "2024-01", "total": 120.5},
                {"month": "2024-02", "total": null}
            ])
        );
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_column_order_survives_serialization() {
        let table = ResultTable {
            columns: vec!["total".into(), "month".into()],
            rows: vec![vec![json!(10), json!("2024-01")]],
        };
        let restored = ResultTable::from_records_json(&table.to_records_json()).unwrap();
        assert_eq!(restored.columns, vec!["total", "month"]);
        assert_eq!(restored.rows, vec![vec![json!(10), json!("2024-01")]]);
    }

    #[test]
    fn test_empty_table_keeps_its_header() {
        let table = ResultTable {
            columns: vec!["region".into(), "amount".into()],
            rows: Vec::new(),
        };
        let restored = ResultTable::from_records_json(&table.to_records_json()).unwrap();
        assert_eq!(restored.columns, vec!["region", "amount"]);
        assert_eq!(restored.row_count(), 0);
    }

    #[test]
    fn test_bare_records_array_is_rejected() {
        assert!(ResultTable::from_records_json("[]").is_err());
    }
}
