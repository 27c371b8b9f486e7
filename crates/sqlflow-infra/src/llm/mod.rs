//! OpenAI-compatible HTTP backends: structured chat completions and
//! embeddings.

pub mod embedding;
pub mod openai_compat;

use std::time::Duration;

use sqlflow_types::llm::LlmError;

/// Shared HTTP client with a generation-friendly timeout.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a non-success HTTP status to an [`LlmError`].
pub(crate) fn error_for_status(status: reqwest::StatusCode, body: String) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        400 | 422 => LlmError::InvalidRequest(body),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {body}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status_mapping() {
        assert!(matches!(
            error_for_status(reqwest::StatusCode::UNAUTHORIZED, String::new()),
            LlmError::AuthenticationFailed
        ));
        assert!(matches!(
            error_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new()),
            LlmError::RateLimited { .. }
        ));
        let err = error_for_status(reqwest::StatusCode::BAD_GATEWAY, "upstream".into());
        assert!(err.to_string().contains("upstream"));
    }
}
