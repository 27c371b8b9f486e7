//! QueryExecutor trait definition.

use sqlflow_types::execution::{ExecutionError, QueryOutcome};

/// Runs native SQL on an external execution service.
///
/// A structurally valid error response from the service is a successful call
/// returning [`QueryOutcome::Error`]; `Err` is reserved for transport and
/// response-shape failures.
///
/// Implementations live in sqlflow-infra (e.g., `MetabaseExecutor`).
pub trait QueryExecutor: Send + Sync {
    fn execute(
        &self,
        database_id: i64,
        sql: &str,
    ) -> impl std::future::Future<Output = Result<QueryOutcome, ExecutionError>> + Send;
}
