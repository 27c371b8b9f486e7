//! Vector search backends for schema retrieval.

pub mod qdrant;
