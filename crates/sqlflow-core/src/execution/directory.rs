//! Resolution of `(client, database)` to an execution-service database id.

/// Maps a client's named database to the id the execution service expects.
///
/// Lookups are synchronous: directories are loaded up front (from config in
/// sqlflow-infra) and consulted on every execution check.
pub trait DatabaseDirectory: Send + Sync {
    fn resolve(&self, client: &str, database: &str) -> Option<i64>;
}
