//! BoxQueryExecutor -- object-safe dynamic dispatch wrapper for QueryExecutor.

use std::future::Future;
use std::pin::Pin;

use sqlflow_types::execution::{ExecutionError, QueryOutcome};

use super::executor::QueryExecutor;

/// Object-safe version of [`QueryExecutor`] with boxed futures.
pub trait QueryExecutorDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        database_id: i64,
        sql: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<QueryOutcome, ExecutionError>> + Send + 'a>>;
}

impl<T: QueryExecutor> QueryExecutorDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        database_id: i64,
        sql: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<QueryOutcome, ExecutionError>> + Send + 'a>> {
        Box::pin(self.execute(database_id, sql))
    }
}

/// Type-erased query executor.
pub struct BoxQueryExecutor {
    inner: Box<dyn QueryExecutorDyn + Send + Sync>,
}

impl BoxQueryExecutor {
    pub fn new<T: QueryExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Box::new(executor),
        }
    }

    pub async fn execute(&self, database_id: i64, sql: &str) -> Result<QueryOutcome, ExecutionError> {
        self.inner.execute_boxed(database_id, sql).await
    }
}
