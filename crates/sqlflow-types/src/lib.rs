//! Shared domain types for sqlflow.
//!
//! This crate contains the data shapes that flow through the question-to-SQL
//! workflow: the run state and its partial updates, checkpoints, schema and
//! execution payloads, structured LLM responses, configuration, and the
//! error types used by the repository and adapter traits in `sqlflow-core`.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, schemars.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod node;
pub mod run;
pub mod schema;
pub mod visualization;
