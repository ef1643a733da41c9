//! Error taxonomy for the core authorization pipeline.

use thiserror::Error;
use warden_sandbox::SandboxError;
use warden_store::StoreError;

/// Errors surfaced by guards, limiters, and the tool runner.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed input or invalid state transition.
    #[error("validation error: {0}")]
    Validation(String),
    /// A guard or broker denied the action. The display form carries the
    /// machine-readable code callers use to prompt for a grant.
    #[error("permission_required:{kind}:{reason}")]
    PermissionDenied {
        /// Denial kind: `mode`, `workspace`, `policy`, a permission name,
        /// or a path reason.
        kind: String,
        /// Human-readable reason.
        reason: String,
    },
    /// A budget or rate limit was exceeded.
    #[error("{0}")]
    Limit(String),
    /// The worker subprocess failed, timed out, or reported an error.
    #[error("{0}")]
    WorkerFailure(String),
    /// Transient outbound provider failure.
    #[error("{0}")]
    Transient(String),
    /// Secret encryption or keychain failure.
    #[error("secret error: {0}")]
    Secret(String),
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// JSON encode/decode failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// IO failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Permission denial with a kind and reason.
    pub fn denied(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::PermissionDenied {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

impl From<SandboxError> for CoreError {
    fn from(err: SandboxError) -> Self {
        CoreError::WorkerFailure(err.to_string())
    }
}
