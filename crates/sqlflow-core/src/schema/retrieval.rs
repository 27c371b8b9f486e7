//! Question-to-schema retrieval.

use std::sync::Arc;

use sqlflow_types::llm::LlmError;
use sqlflow_types::schema::{SchemaContext, SchemaHit, TableDocument};

use super::box_embedder::BoxEmbedder;
use super::box_index::BoxSchemaIndex;

/// Collection holding a client's schema documents for one database.
///
/// The client part is lower-cased with spaces removed: `("Acme Corp", "sales")`
/// maps to `"acmecorp_sales"`.
pub fn collection_name(client: &str, database: &str) -> String {
    let client: String = client
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    format!("{client}_{database}")
}

/// Embeds a question and collects known tables/columns from the nearest
/// schema documents.
pub struct SchemaRetriever {
    embedder: Arc<BoxEmbedder>,
    index: Arc<BoxSchemaIndex>,
    top_k: usize,
    score_threshold: f32,
}

impl SchemaRetriever {
    pub fn new(
        embedder: Arc<BoxEmbedder>,
        index: Arc<BoxSchemaIndex>,
        top_k: usize,
        score_threshold: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k,
            score_threshold,
        }
    }

    pub async fn retrieve(
        &self,
        client: &str,
        database: &str,
        question: &str,
    ) -> Result<SchemaContext, LlmError> {
        let collection = collection_name(client, database);
        let vector = self.embedder.embed(question).await?;
        let hits = self
            .index
            .search(&collection, &vector, self.top_k, self.score_threshold)
            .await?;

        tracing::debug!(
            collection = collection.as_str(),
            hits = hits.len(),
            embedding_model = self.embedder.model_name(),
            "retrieved schema documents"
        );

        Ok(context_from_hits(&collection, hits))
    }
}

/// Union the tables/columns of every well-formed hit. Malformed payloads are
/// skipped with a warning.
pub fn context_from_hits(collection: &str, hits: Vec<SchemaHit>) -> SchemaContext {
    let mut tables = Vec::with_capacity(hits.len());
    let mut raw = Vec::with_capacity(hits.len());
    for hit in hits {
        match TableDocument::from_payload(&hit.payload) {
            Ok(doc) => tables.push(doc),
            Err(reason) => {
                tracing::warn!(
                    collection,
                    hit_id = hit.id.as_str(),
                    reason = %reason,
                    "skipping schema entry"
                );
                continue;
            }
        }
        raw.push(hit.payload);
    }
    SchemaContext::from_documents(raw, &tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collection_name_normalizes_client() {
        assert_eq!(collection_name("Acme Corp", "sales"), "acmecorp_sales");
        assert_eq!(collection_name("bob", "crm"), "bob_crm");
    }

    #[test]
    fn context_from_hits_skips_malformed_payloads() {
        let hits = vec![
            SchemaHit {
                id: "1".into(),
                score: 0.9,
                payload: json!({"original_data": {
                    "Table Name": "sales",
                    "Columns": [{"Column Name": "amount"}, {"Column Name": "date"}]
                }}),
            },
            SchemaHit {
                id: "2".into(),
                score: 0.5,
                payload: json!({"text": "no original data"}),
            },
        ];
        let ctx = context_from_hits("acme_sales", hits);
        assert_eq!(ctx.tables, vec!["sales"]);
        assert_eq!(ctx.columns, vec!["amount", "date"]);
        assert_eq!(ctx.documents.len(), 1);
    }
}
