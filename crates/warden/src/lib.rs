//! Public surface for the Warden backend.
//!
//! This crate re-exports the building blocks and provides a small logging
//! initialization helper to keep consumer setup consistent.

/// Re-export for convenience.
pub use warden_core as core;
/// Re-export for convenience.
pub use warden_protocol as protocol;
/// Re-export for convenience.
pub use warden_sandbox as sandbox;
/// Re-export for convenience.
pub use warden_store as store;
/// Re-export for convenience.
pub use warden_tools as tools;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still
/// expected to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
