//! Question embeddings via an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use sqlflow_core::schema::embedder::Embedder;
use sqlflow_types::config::EmbeddingConfig;
use sqlflow_types::llm::LlmError;

use super::{error_for_status, http_client};

/// Remote embedder. The model must match the one the schema collections
/// were indexed with.
pub struct OpenAiCompatEmbedder {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiCompatEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: SecretString) -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }
}

/// First embedding vector of an `/embeddings` response.
pub fn parse_embedding(response: &Value) -> Result<Vec<f32>, LlmError> {
    let values = response
        .pointer("/data/0/embedding")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::Deserialization("response has no data[0].embedding".into()))?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| LlmError::Deserialization("non-numeric embedding value".into()))
        })
        .collect()
}

impl Embedder for OpenAiCompatEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, error_body));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;
        parse_embedding(&payload)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding() {
        let response = json!({ "data": [{ "embedding": [0.25, -0.5, 1.0] }] });
        assert_eq!(parse_embedding(&response).unwrap(), vec![0.25, -0.5, 1.0]);
    }

    #[test]
    fn test_parse_embedding_rejects_missing_data() {
        assert!(parse_embedding(&json!({ "data": [] })).is_err());
        assert!(parse_embedding(&json!({ "data": [{ "embedding": ["x"] }] })).is_err());
    }
}
