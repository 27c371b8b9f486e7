//! Metabase as the query-execution service.
//!
//! Queries run as native SQL through `POST /api/dataset` with a session token
//! obtained from `POST /api/session`. The token is cached and refreshed once
//! when the service answers 401. A failed query comes back as a successful
//! HTTP response whose body reports the error; that is a [`QueryOutcome::Error`],
//! not an [`ExecutionError`].

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use sqlflow_core::execution::executor::QueryExecutor;
use sqlflow_types::config::MetabaseConfig;
use sqlflow_types::execution::{ExecutionError, QueryOutcome, ResultTable};

const SESSION_HEADER: &str = "X-Metabase-Session";

/// Does NOT derive Debug: it holds the service password and session token.
pub struct MetabaseExecutor {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: SecretString,
    session: Mutex<Option<Arc<SecretString>>>,
}

impl MetabaseExecutor {
    pub fn new(config: &MetabaseConfig, password: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password,
            session: Mutex::new(None),
        }
    }

    async fn login(&self) -> Result<SecretString, ExecutionError> {
        let response = self
            .client
            .post(format!("{}/api/session", self.base_url))
            .json(&json!({
                "username": self.username,
                "password": self.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutionError::Auth(format!("HTTP {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ExecutionError::MalformedResponse(e.to_string()))?;
        let token = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ExecutionError::Auth("session response has no 'id'".into()))?;

        tracing::debug!(username = self.username.as_str(), "opened metabase session");
        Ok(SecretString::from(token.to_string()))
    }

    /// Cached session token, logging in when there is none (or `refresh`).
    async fn session_token(&self, refresh: bool) -> Result<Arc<SecretString>, ExecutionError> {
        let mut session = self.session.lock().await;
        if !refresh {
            if let Some(token) = session.as_ref() {
                return Ok(Arc::clone(token));
            }
        }
        let token = Arc::new(self.login().await?);
        *session = Some(Arc::clone(&token));
        Ok(token)
    }

    async fn post_dataset(
        &self,
        token: &SecretString,
        body: &Value,
    ) -> Result<reqwest::Response, ExecutionError> {
        self.client
            .post(format!("{}/api/dataset", self.base_url))
            .header(SESSION_HEADER, token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))
    }
}

/// Native-query request body for `POST /api/dataset`.
pub fn dataset_request(database_id: i64, sql: &str) -> Value {
    json!({
        "type": "native",
        "database": database_id,
        "native": { "query": sql, "template-tags": {} },
        "parameters": []
    })
}

/// Interpret a `/api/dataset` response body.
pub fn parse_dataset_response(body: &Value) -> Result<QueryOutcome, ExecutionError> {
    let failed = body.get("status").and_then(Value::as_str) == Some("failed");
    if failed || body.get("error").is_some_and(|e| !e.is_null()) {
        let message = body
            .pointer("/via/0/error")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("query failed without an error message");
        return Ok(QueryOutcome::Error(message.to_string()));
    }

    let data = body
        .get("data")
        .ok_or_else(|| ExecutionError::MalformedResponse("response has no 'data'".into()))?;
    let columns = data
        .get("cols")
        .and_then(Value::as_array)
        .ok_or_else(|| ExecutionError::MalformedResponse("response has no 'data.cols'".into()))?
        .iter()
        .map(|col| {
            col.get("display_name")
                .or_else(|| col.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    let rows = data
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| ExecutionError::MalformedResponse("response has no 'data.rows'".into()))?
        .iter()
        .map(|row| row.as_array().cloned().unwrap_or_default())
        .collect();

    Ok(QueryOutcome::Rows(ResultTable { columns, rows }))
}

impl QueryExecutor for MetabaseExecutor {
    async fn execute(&self, database_id: i64, sql: &str) -> Result<QueryOutcome, ExecutionError> {
        let body = dataset_request(database_id, sql);

        let token = self.session_token(false).await?;
        let mut response = self.post_dataset(&token, &body).await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!("metabase session expired, logging in again");
            let token = self.session_token(true).await?;
            response = self.post_dataset(&token, &body).await?;
        }

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ExecutionError::Auth("session rejected after refresh".into()));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExecutionError::MalformedResponse(format!("HTTP {status}: {e}")))?;

        let outcome = parse_dataset_response(&payload)?;
        match &outcome {
            QueryOutcome::Rows(table) => {
                tracing::debug!(database_id, rows = table.row_count(), "query executed")
            }
            QueryOutcome::Error(message) => {
                tracing::debug!(database_id, error = message.as_str(), "query rejected")
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_request_shape() {
        let body = dataset_request(7, "SELECT 1");
        assert_eq!(body["type"], "native");
        assert_eq!(body["database"], 7);
        assert_eq!(body["native"]["query"], "SELECT 1");
        assert!(body["native"]["template-tags"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parse_rows_uses_display_names() {
        let body = json!({
            "status": "completed",
            "data": {
                "cols": [{ "name": "MONTH", "display_name": "Month" }, { "name": "TOTAL" }],
                "rows": [["2024-01", 10], ["2024-02", 12]]
            }
        });
        let QueryOutcome::Rows(table) = parse_dataset_response(&body).unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(table.columns, vec!["Month", "TOTAL"]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_parse_failed_query_prefers_via_error() {
        let body = json!({
            "status": "failed",
            "error": "generic",
            "via": [{ "error": "Table \"ORDERS\" not found" }]
        });
        assert_eq!(
            parse_dataset_response(&body).unwrap(),
            QueryOutcome::Error("Table \"ORDERS\" not found".into())
        );
    }

    #[test]
    fn test_parse_missing_data_is_malformed() {
        let err = parse_dataset_response(&json!({ "status": "completed" })).unwrap_err();
        assert!(matches!(err, ExecutionError::MalformedResponse(_)));
    }
}
