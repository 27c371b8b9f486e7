//! BoxSchemaIndex -- object-safe dynamic dispatch wrapper for SchemaIndex.

use std::future::Future;
use std::pin::Pin;

use sqlflow_types::llm::LlmError;
use sqlflow_types::schema::SchemaHit;

use super::index::SchemaIndex;

/// Object-safe version of [`SchemaIndex`] with boxed futures.
pub trait SchemaIndexDyn: Send + Sync {
    fn search_boxed<'a>(
        &'a self,
        collection: &'a str,
        vector: &'a [f32],
        limit: usize,
        score_threshold: f32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SchemaHit>, LlmError>> + Send + 'a>>;
}

impl<T: SchemaIndex> SchemaIndexDyn for T {
    fn search_boxed<'a>(
        &'a self,
        collection: &'a str,
        vector: &'a [f32],
        limit: usize,
        score_threshold: f32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SchemaHit>, LlmError>> + Send + 'a>> {
        Box::pin(self.search(collection, vector, limit, score_threshold))
    }
}

/// Type-erased schema index.
pub struct BoxSchemaIndex {
    inner: Box<dyn SchemaIndexDyn + Send + Sync>,
}

impl BoxSchemaIndex {
    pub fn new<T: SchemaIndex + 'static>(index: T) -> Self {
        Self {
            inner: Box::new(index),
        }
    }

    pub async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SchemaHit>, LlmError> {
        self.inner
            .search_boxed(collection, vector, limit, score_threshold)
            .await
    }
}
