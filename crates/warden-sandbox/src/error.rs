//! Sandbox error types.

/// Errors returned while launching or supervising a worker process.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Request could not be serialized onto the worker's stdin.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    /// Worker exceeded its wall timeout and was killed.
    #[error("tool worker timed out after {seconds}s")]
    Timeout {
        /// Configured wall timeout in seconds.
        seconds: u64,
    },
}
