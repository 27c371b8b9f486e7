//! Structured generation against an OpenAI-compatible `/chat/completions`
//! endpoint.
//!
//! Every request carries a `response_format` of type `json_schema`, so the
//! assistant message content is a JSON document matching the requested
//! schema. The API key is wrapped in [`SecretString`] and only exposed when
//! building the authorization header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Value, json};

use sqlflow_core::llm::generator::TextGenerator;
use sqlflow_types::config::LlmConfig;
use sqlflow_types::llm::{LlmError, ResponseSchema};

use super::{error_for_status, http_client};

/// OpenAI-compatible structured-output generator.
///
/// Does NOT derive Debug, so the API key cannot end up in logs.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    response_format: Value,
}

impl OpenAiCompatGenerator {
    pub fn new(config: &LlmConfig, api_key: SecretString) -> Self {
        Self {
            client: http_client(Duration::from_secs(120)),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    fn request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        schema: &ResponseSchema,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                }
            }),
        }
    }
}

/// Extract and parse the JSON document from a chat completion response.
pub fn parse_structured_content(response: &Value) -> Result<Value, LlmError> {
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            LlmError::Deserialization("response has no choices[0].message.content".to_string())
        })?;
    serde_json::from_str(content)
        .map_err(|e| LlmError::Deserialization(format!("content is not JSON: {e}")))
}

impl TextGenerator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Value, LlmError> {
        let body = self.request(system_prompt, user_prompt, schema);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
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

        tracing::debug!(
            model = self.model.as_str(),
            schema = schema.name.as_str(),
            "structured generation complete"
        );
        parse_structured_content(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlflow_types::llm::{SQL_QUERY_SCHEMA, SqlQueryResponse};

    fn generator() -> OpenAiCompatGenerator {
        OpenAiCompatGenerator::new(&LlmConfig::default(), SecretString::from("sk-test".to_string()))
    }

    #[test]
    fn test_request_carries_json_schema_format() {
        let generator = generator();
        let schema = ResponseSchema::of::<SqlQueryResponse>(SQL_QUERY_SCHEMA);
        let body = serde_json::to_value(generator.request("sys", "user", &schema)).unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], SQL_QUERY_SCHEMA);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_parse_structured_content() {
        let response = json!({
            "choices": [{ "message": { "content": "{\"sql_query\": \"SELECT 1\"}" } }]
        });
        let value = parse_structured_content(&response).unwrap();
        assert_eq!(value["sql_query"], "SELECT 1");
    }

    #[test]
    fn test_parse_rejects_non_json_content() {
        let response = json!({ "choices": [{ "message": { "content": "SELECT 1" } }] });
        assert!(matches!(
            parse_structured_content(&response),
            Err(LlmError::Deserialization(_))
        ));
        assert!(parse_structured_content(&json!({})).is_err());
    }
}
