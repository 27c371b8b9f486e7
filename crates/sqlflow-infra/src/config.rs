//! Configuration loading for sqlflow.
//!
//! Reads `config.toml` from the data directory (`~/.sqlflow/` by default,
//! overridable with `SQLFLOW_DATA_DIR`) into [`AppConfig`], falling back to
//! defaults when the file is missing or malformed. Secrets are read from the
//! environment variables the config names.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use sqlflow_types::config::AppConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SQLFLOW_DATA_DIR";

/// Errors resolving runtime configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingSecret(String),

    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The data directory: `$SQLFLOW_DATA_DIR`, else `~/.sqlflow`.
pub fn resolve_data_dir() -> PathBuf {
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sqlflow"),
    }
}

/// Create the data directory if needed.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<(), ConfigError> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|source| ConfigError::DataDir {
            path: data_dir.to_path_buf(),
            source,
        })
}

/// Load `{data_dir}/config.toml`.
///
/// - Missing file: defaults.
/// - Unreadable or unparsable file: warning, then defaults.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Read a secret from the named environment variable. Empty values count as
/// unset.
pub fn read_secret(env_var: &str) -> Option<SecretString> {
    std::env::var(env_var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

pub fn require_secret(env_var: &str) -> Result<SecretString, ConfigError> {
    read_secret(env_var).ok_or_else(|| ConfigError::MissingSecret(env_var.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_app_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_app_config(tmp.path()).await;
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn load_app_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[engine]
max_attempts = 3
max_feedback_rounds = 0

[llm]
model = "gpt-4o"

[[databases]]
client = "acmecorp"
database = "sales"
metabase_database_id = 7
"#,
        )
        .await
        .unwrap();

        let config = load_app_config(tmp.path()).await;
        assert_eq!(config.engine.max_attempts, 3);
        assert_eq!(config.engine.feedback_round_limit(), None);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.databases.len(), 1);
        assert_eq!(config.qdrant.hnsw_ef, 128);
    }

    #[tokio::test]
    async fn load_app_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_app_config(tmp.path()).await;
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn ensure_data_dir_creates_nested_directories() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_data_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn require_secret_reports_variable_name() {
        let err = require_secret("SQLFLOW_TEST_SECRET_THAT_IS_NEVER_SET").unwrap_err();
        assert!(err.to_string().contains("SQLFLOW_TEST_SECRET_THAT_IS_NEVER_SET"));
    }
}
