//! Resumable question-to-SQL workflow.
//!
//! - `graph`: static node/edge definition with fan-out, joins and routers
//! - `routing`: conditional routing functions
//! - `nodes`: node behaviors and their write contracts
//! - `prompts`: generation prompts
//! - `checkpoint`: durable checkpoint manager over a `CheckpointStore`
//! - `engine`: wave-based executor with suspend/resume

pub mod checkpoint;
pub mod engine;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod routing;
