//! Configuration types for sqlflow.
//!
//! `AppConfig` is the top-level `config.toml`. Every section has defaults so
//! an empty file (or no file) yields a usable configuration. Secrets are never
//! stored here: sections name the environment variable that holds them.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Knobs consumed by the workflow engine and its nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for `attempt_count`; at the bound the gate proceeds.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Human feedback rounds before the run finalizes with the generated
    /// recommendation. `0` disables the bound.
    #[serde(default = "default_max_feedback_rounds")]
    pub max_feedback_rounds: u32,

    /// Nearest-neighbor hits retrieved as schema context.
    #[serde(default = "default_schema_top_k")]
    pub schema_top_k: usize,

    /// Minimum similarity score for a schema hit.
    #[serde(default = "default_schema_score_threshold")]
    pub schema_score_threshold: f32,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_max_feedback_rounds() -> u32 {
    5
}

fn default_schema_top_k() -> usize {
    5
}

fn default_schema_score_threshold() -> f32 {
    0.2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_feedback_rounds: default_max_feedback_rounds(),
            schema_top_k: default_schema_top_k(),
            schema_score_threshold: default_schema_score_threshold(),
        }
    }
}

impl EngineConfig {
    /// The feedback round bound, or `None` when unbounded.
    pub fn feedback_round_limit(&self) -> Option<u32> {
        (self.max_feedback_rounds > 0).then_some(self.max_feedback_rounds)
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat completions endpoint used for structured generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: Option<f64>,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_api_key_env() -> String {
    "SQLFLOW_LLM_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            temperature: Some(0.0),
        }
    }
}

/// OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_embedding_model(),
            api_key_env: default_llm_api_key_env(),
        }
    }
}

/// Qdrant REST endpoint holding per-client schema collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_hnsw_ef")]
    pub hnsw_ef: u32,
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_hnsw_ef() -> u32 {
    128
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key_env: None,
            hnsw_ef: default_hnsw_ef(),
        }
    }
}

/// Metabase instance used as the query-execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetabaseConfig {
    #[serde(default = "default_metabase_url")]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_metabase_password_env")]
    pub password_env: String,
}

fn default_metabase_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_metabase_password_env() -> String {
    "SQLFLOW_METABASE_PASSWORD".to_string()
}

impl Default for MetabaseConfig {
    fn default() -> Self {
        Self {
            url: default_metabase_url(),
            username: String::new(),
            password_env: default_metabase_password_env(),
        }
    }
}

/// Maps a `(client, database)` pair to the execution service's database id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMapping {
    pub client: String,
    pub database: String,
    pub metabase_database_id: i64,
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Top-level configuration, loaded from `{data_dir}/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub metabase: MetabaseConfig,
    #[serde(default)]
    pub databases: Vec<DatabaseMapping>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.feedback_round_limit(), Some(5));
        assert_eq!(config.schema_top_k, 5);
        assert!((config.schema_score_threshold - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_zero_feedback_rounds_is_unbounded() {
        let config = EngineConfig {
            max_feedback_rounds: 0,
            ..Default::default()
        };
        assert_eq!(config.feedback_round_limit(), None);
    }

    #[test]
    fn test_app_config_deserialize_with_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.qdrant.hnsw_ef, 128);
        assert!(config.databases.is_empty());
    }

    #[test]
    fn test_app_config_deserialize_with_values() {
        let toml_str = r#"
[engine]
max_attempts = 3

[metabase]
url = "https://bi.example.com"
username = "svc-sqlflow"

[[databases]]
client = "acmecorp"
database = "warehouse"
metabase_database_id = 7
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.max_attempts, 3);
        assert_eq!(config.engine.max_feedback_rounds, 5);
        assert_eq!(config.metabase.url, "https://bi.example.com");
        assert_eq!(config.metabase.password_env, "SQLFLOW_METABASE_PASSWORD");
        assert_eq!(config.databases.len(), 1);
        assert_eq!(config.databases[0].metabase_database_id, 7);
    }
}
