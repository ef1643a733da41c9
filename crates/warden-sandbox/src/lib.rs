//! Subprocess isolation for tool workers.
//!
//! The worker child receives one serialized request on stdin and nothing
//! else: its environment is scrubbed to a minimal allowlist, it inherits no
//! handles to the grant store, and its lifetime is bounded by a hard wall
//! timeout.

mod error;
mod launcher;

pub use error::SandboxError;
pub use launcher::{WorkerLauncher, WorkerOutcome};

use std::collections::BTreeMap;

/// Default wall timeout for a worker run.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
/// Default per-stream output ceiling in bytes.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 262_144;
/// Marker appended when a stream is cut at the ceiling.
pub const TRUNCATION_MARKER: &str = "\n<truncated>";

/// Environment variables forwarded into the worker when set.
const KEPT_ENV_VARS: [&str; 5] = ["SYSTEMROOT", "COMSPEC", "WINDIR", "TEMP", "TMP"];

/// Build the scrubbed environment for a worker process: OS paths and temp
/// dirs only, plus a UTF-8 IO hint. Everything else (tokens, proxies, shell
/// state) stays in the parent.
pub fn scrubbed_env() -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for key in KEPT_ENV_VARS {
        if let Ok(value) = std::env::var(key) {
            env.insert(key.to_string(), value);
        }
    }
    env.insert("LANG".to_string(), "C.UTF-8".to_string());
    env
}

/// Cut `value` to at most `max_bytes` of UTF-8 and append the truncation
/// marker when anything was dropped.
pub fn truncate_output(value: &str, max_bytes: usize) -> (String, bool) {
    if value.len() <= max_bytes {
        return (value.to_string(), false);
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    (format!("{}{}", &value[..end], TRUNCATION_MARKER), true)
}
