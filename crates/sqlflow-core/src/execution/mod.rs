//! Query execution against the external BI/execution service.

pub mod box_executor;
pub mod directory;
pub mod executor;
