//! Store error types.

use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// JSON column could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// A stored value is not representable in the domain model.
    #[error("corrupt row: {0}")]
    Corrupt(String),
    /// Referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}
