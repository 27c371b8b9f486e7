//! SchemaIndex trait: nearest-neighbor search over schema documents.

use sqlflow_types::llm::LlmError;
use sqlflow_types::schema::SchemaHit;

/// A vector index holding one collection per `(client, database)` pair.
///
/// Implementations live in sqlflow-infra (e.g., `QdrantSchemaIndex`).
pub trait SchemaIndex: Send + Sync {
    /// Return at most `limit` hits scoring at least `score_threshold`, best first.
    fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> impl std::future::Future<Output = Result<Vec<SchemaHit>, LlmError>> + Send;
}
