//! Embedder trait for text-to-vector conversion.

use sqlflow_types::llm::LlmError;

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in sqlflow-infra.
pub trait Embedder: Send + Sync {
    /// Embed a single text into a vector.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// The model name used for embeddings (e.g., "text-embedding-3-small").
    fn model_name(&self) -> &str;
}
