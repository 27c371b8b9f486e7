//! Qdrant REST search over per-client schema collections.
//!
//! Collections are populated out of band; each point's payload carries an
//! `original_data` object describing one table. Only search is implemented.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use sqlflow_core::schema::index::SchemaIndex;
use sqlflow_types::config::QdrantConfig;
use sqlflow_types::llm::LlmError;
use sqlflow_types::schema::SchemaHit;

use crate::llm::{error_for_status, http_client};

pub struct QdrantSchemaIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    hnsw_ef: u32,
}

impl QdrantSchemaIndex {
    pub fn new(config: &QdrantConfig, api_key: Option<SecretString>) -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
            hnsw_ef: config.hnsw_ef,
        }
    }

    fn search_body(&self, vector: &[f32], limit: usize, score_threshold: f32) -> Value {
        json!({
            "vector": vector,
            "limit": limit,
            "score_threshold": score_threshold,
            "with_payload": true,
            "params": { "hnsw_ef": self.hnsw_ef, "exact": false }
        })
    }
}

/// Hits of a `points/search` response, in the order returned.
pub fn parse_search_response(response: &Value) -> Result<Vec<SchemaHit>, LlmError> {
    let points = response
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::Deserialization("search response has no 'result' list".into()))?;

    points
        .iter()
        .map(|point| {
            let id = match point.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return Err(LlmError::Deserialization("point has no id".into())),
            };
            let score = point
                .get("score")
                .and_then(Value::as_f64)
                .ok_or_else(|| LlmError::Deserialization(format!("point {id} has no score")))?;
            Ok(SchemaHit {
                id,
                score: score as f32,
                payload: point.get("payload").cloned().unwrap_or(Value::Null),
            })
        })
        .collect()
}

impl SchemaIndex for QdrantSchemaIndex {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SchemaHit>, LlmError> {
        let url = format!("{}/collections/{collection}/points/search", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .json(&self.search_body(vector, limit, score_threshold));
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key.expose_secret());
        }

        let response = request.send().await.map_err(|e| LlmError::Provider {
            message: format!("qdrant request failed: {e}"),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(collection, "schema collection not found");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, error_body));
        }

        let payload: Value = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse search response: {e}"))
        })?;
        parse_search_response(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_uses_configured_ef() {
        let index = QdrantSchemaIndex::new(&QdrantConfig::default(), None);
        let body = index.search_body(&[0.5, 0.25], 5, 0.2);
        assert_eq!(body["limit"], 5);
        assert_eq!(body["params"]["hnsw_ef"], 128);
        assert_eq!(body["with_payload"], true);
        assert_eq!(body["vector"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_search_response() {
        let response = json!({
            "result": [
                {
                    "id": "7c1e",
                    "score": 0.83,
                    "payload": { "original_data": { "Table Name": "sales", "Columns": [] } }
                },
                { "id": 12, "score": 0.41 }
            ],
            "status": "ok"
        });
        let hits = parse_search_response(&response).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "7c1e");
        assert_eq!(hits[0].payload["original_data"]["Table Name"], "sales");
        assert_eq!(hits[1].id, "12");
        assert!(hits[1].payload.is_null());
    }

    #[test]
    fn test_parse_search_response_requires_result() {
        assert!(parse_search_response(&json!({ "status": "ok" })).is_err());
    }
}
