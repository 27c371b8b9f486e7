//! Repository trait definitions (ports).
//!
//! The infrastructure layer (sqlflow-infra) implements these with SQLite
//! persistence. An in-memory implementation lives here for embedding and tests.

pub mod checkpoint;
pub mod memory;
