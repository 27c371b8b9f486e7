//! TextGenerator trait definition.

use serde_json::Value;

use sqlflow_types::llm::{LlmError, ResponseSchema};

/// Trait for text-generation backends with constrained (structured) output.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). The returned
/// value must be a JSON object matching `schema`; callers deserialize it.
///
/// Implementations live in sqlflow-infra (e.g., `OpenAiCompatGenerator`).
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g., "openai_compatible").
    fn name(&self) -> &str;

    /// The model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Generate a structured object for the given prompts.
    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &ResponseSchema,
    ) -> impl std::future::Future<Output = Result<Value, LlmError>> + Send;
}
