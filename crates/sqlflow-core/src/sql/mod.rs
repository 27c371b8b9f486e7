//! SQL inspection: reference extraction and schema validation.

pub mod references;
pub mod validator;

pub use validator::{SchemaValidation, validate_schema};
