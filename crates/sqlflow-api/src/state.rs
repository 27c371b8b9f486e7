//! Application state wiring the engine to its concrete adapters.
//!
//! Inspection commands only need the checkpoint store, so the engine (and the
//! secrets its HTTP adapters require) is built on demand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use sqlflow_core::execution::box_executor::BoxQueryExecutor;
use sqlflow_core::llm::box_generator::BoxTextGenerator;
use sqlflow_core::schema::box_embedder::BoxEmbedder;
use sqlflow_core::schema::box_index::BoxSchemaIndex;
use sqlflow_core::schema::retrieval::SchemaRetriever;
use sqlflow_core::workflow::checkpoint::CheckpointManager;
use sqlflow_core::workflow::engine::WorkflowEngine;
use sqlflow_core::workflow::nodes::{NodeRunner, NodeServices};
use sqlflow_infra::config::{ensure_data_dir, load_app_config, read_secret, require_secret, resolve_data_dir};
use sqlflow_infra::directory::ConfiguredDatabases;
use sqlflow_infra::llm::embedding::OpenAiCompatEmbedder;
use sqlflow_infra::llm::openai_compat::OpenAiCompatGenerator;
use sqlflow_infra::metabase::MetabaseExecutor;
use sqlflow_infra::sqlite::checkpoint::SqliteCheckpointStore;
use sqlflow_infra::sqlite::pool::{DatabasePool, database_url};
use sqlflow_infra::vector::qdrant::QdrantSchemaIndex;
use sqlflow_types::config::AppConfig;

/// Engine pinned to the SQLite checkpoint store.
pub type ConcreteEngine = WorkflowEngine<SqliteCheckpointStore>;

pub struct AppState {
    pub data_dir: PathBuf,
    pub config: AppConfig,
    pub checkpoints: CheckpointManager<SqliteCheckpointStore>,
    store: SqliteCheckpointStore,
}

impl AppState {
    /// Resolve the data directory, load config and open the checkpoint database.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir).await?;

        let config = load_app_config(&data_dir).await;

        let db_pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .with_context(|| format!("failed to open checkpoint database in {}", data_dir.display()))?;
        let store = SqliteCheckpointStore::new(db_pool);

        Ok(Self {
            data_dir,
            checkpoints: CheckpointManager::new(store.clone()),
            config,
            store,
        })
    }

    /// Build the workflow engine with the LLM, vector, and Metabase adapters.
    pub fn engine(&self) -> anyhow::Result<ConcreteEngine> {
        let config = &self.config;

        let llm_key = require_secret(&config.llm.api_key_env)?;
        let embedding_key = require_secret(&config.embedding.api_key_env)?;
        let metabase_password = require_secret(&config.metabase.password_env)?;
        let qdrant_key = config.qdrant.api_key_env.as_deref().and_then(read_secret);

        let directory = ConfiguredDatabases::new(&config.databases);
        if directory.is_empty() {
            tracing::warn!("no [[databases]] configured; execution checks will fail");
        }

        let retriever = SchemaRetriever::new(
            Arc::new(BoxEmbedder::new(OpenAiCompatEmbedder::new(&config.embedding, embedding_key))),
            Arc::new(BoxSchemaIndex::new(QdrantSchemaIndex::new(&config.qdrant, qdrant_key))),
            config.engine.schema_top_k,
            config.engine.schema_score_threshold,
        );

        let services = NodeServices {
            generator: Arc::new(BoxTextGenerator::new(OpenAiCompatGenerator::new(&config.llm, llm_key))),
            retriever: Arc::new(retriever),
            executor: Arc::new(BoxQueryExecutor::new(MetabaseExecutor::new(
                &config.metabase,
                metabase_password,
            ))),
            directory: Arc::new(directory),
        };

        let runner = NodeRunner::new(services, config.engine.clone());
        Ok(WorkflowEngine::new(self.store.clone(), runner)?)
    }
}
