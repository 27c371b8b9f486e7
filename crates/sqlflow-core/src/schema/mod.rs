//! Schema retrieval: embedding a question and searching a per-client vector
//! index for the tables and columns relevant to it.

pub mod box_embedder;
pub mod box_index;
pub mod embedder;
pub mod index;
pub mod retrieval;
