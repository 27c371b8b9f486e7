use thiserror::Error;

/// Errors from repository operations (checkpoint stores).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    /// Optimistic concurrency failure: another writer got there first.
    #[error("conflict: {0}")]
    Conflict(String),
}
