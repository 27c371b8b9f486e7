//! Workflow engine and port trait definitions for sqlflow.
//!
//! This crate defines the "ports" (text generation, embedding, schema index,
//! query execution, database directory, checkpoint store) that the
//! infrastructure layer implements, plus everything that runs on top of them:
//! the SQL validator, the static workflow graph, node behaviors and the
//! resumable engine. It depends only on `sqlflow-types` -- never on
//! `sqlflow-infra` or any network/database crate.

pub mod execution;
pub mod llm;
pub mod repository;
pub mod schema;
pub mod sql;
pub mod workflow;
