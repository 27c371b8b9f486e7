//! Text-generation abstractions.
//!
//! - `TextGenerator`: RPITIT trait for concrete structured-output backends
//! - `BoxTextGenerator`: object-safe wrapper for dynamic dispatch, with a typed
//!   `generate_as` helper that derives the response schema from a Rust type

pub mod box_generator;
pub mod generator;
