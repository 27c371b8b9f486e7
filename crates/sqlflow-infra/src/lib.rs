//! Infrastructure layer for sqlflow.
//!
//! Implements the ports defined in `sqlflow-core`: SQLite checkpoint storage,
//! OpenAI-compatible generation and embeddings, Qdrant schema search, Metabase
//! query execution, plus config and data-directory resolution.

pub mod config;
pub mod directory;
pub mod llm;
pub mod metabase;
pub mod sqlite;
pub mod vector;
