//! Run budgets and the per-session sliding-window rate limit.

use crate::error::CoreError;
use crate::identity::{Identity, Settings};
use crate::policy::{apply_limit_overrides, parse_policy};
use log::debug;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Budgets and live counters for one logical run.
///
/// Every check fails before the side effect it guards; counters only move
/// through the `record_*` methods.
#[derive(Debug)]
pub struct RunLimiter {
    session_id: String,
    max_tool_calls_per_message: u64,
    max_tool_calls_per_minute: u64,
    max_files_read_per_run: u64,
    max_bytes_read_per_run: u64,
    max_runtime_seconds: u64,
    started: Instant,
    tool_calls: u64,
    files_read: u64,
    bytes_read: u64,
}

impl RunLimiter {
    /// Limiter from a named limits map; missing keys fall back to defaults.
    pub fn new(limits: &BTreeMap<String, u64>, session_id: &str) -> Self {
        let defaults = Settings::default();
        let pick = |key: &str, fallback: u64| limits.get(key).copied().unwrap_or(fallback);
        Self {
            session_id: session_id.to_string(),
            max_tool_calls_per_message: pick(
                "max_tool_calls_per_message",
                defaults.max_tool_calls_per_message,
            ),
            max_tool_calls_per_minute: pick(
                "max_tool_calls_per_minute",
                defaults.max_tool_calls_per_minute,
            ),
            max_files_read_per_run: pick(
                "max_files_read_per_run",
                defaults.max_files_read_per_run,
            ),
            max_bytes_read_per_run: pick(
                "max_bytes_read_per_run",
                defaults.max_bytes_read_per_run,
            ),
            max_runtime_seconds: pick("max_runtime_seconds", defaults.max_runtime_seconds),
            started: Instant::now(),
            tool_calls: 0,
            files_read: 0,
            bytes_read: 0,
        }
    }

    /// Session this limiter belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Per-minute rate cap, used with the shared [`RateLimiter`].
    pub fn max_tool_calls_per_minute(&self) -> u64 {
        self.max_tool_calls_per_minute
    }

    /// Per-message tool call cap.
    pub fn max_tool_calls_per_message(&self) -> u64 {
        self.max_tool_calls_per_message
    }

    /// Fail when the run has exceeded its wall-clock budget.
    pub fn check_runtime(&self) -> Result<(), CoreError> {
        if self.started.elapsed() > Duration::from_secs(self.max_runtime_seconds) {
            return Err(CoreError::Limit("Run time limit exceeded".to_string()));
        }
        Ok(())
    }

    /// Fail when one more tool call would exceed the per-message cap.
    pub fn check_tool_call(&self) -> Result<(), CoreError> {
        if self.tool_calls + 1 > self.max_tool_calls_per_message {
            return Err(CoreError::Limit(
                "Tool call limit exceeded for this message".to_string(),
            ));
        }
        Ok(())
    }

    /// Count one tool call.
    pub fn record_tool_call(&mut self) {
        self.tool_calls += 1;
    }

    /// Count file reads, checking both caps before accumulating.
    pub fn record_file_reads(&mut self, files: u64, bytes: u64) -> Result<(), CoreError> {
        if self.files_read + files > self.max_files_read_per_run {
            return Err(CoreError::Limit(
                "File read count limit exceeded".to_string(),
            ));
        }
        if self.bytes_read + bytes > self.max_bytes_read_per_run {
            return Err(CoreError::Limit(
                "File read bytes limit exceeded".to_string(),
            ));
        }
        self.files_read += files;
        self.bytes_read += bytes;
        Ok(())
    }
}

/// Process-wide sliding window of call timestamps per session.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Empty rate limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when one more call within the window would exceed the cap.
    /// Expired timestamps are dropped first; an admitted call is recorded.
    pub fn enforce(&self, session_id: &str, max_per_minute: u64) -> Result<(), CoreError> {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let window = windows.entry(session_id.to_string()).or_default();
        while window
            .front()
            .is_some_and(|first| now.duration_since(*first) > RATE_WINDOW)
        {
            window.pop_front();
        }
        if window.len() as u64 + 1 > max_per_minute {
            debug!("rate limit hit (session={session_id})");
            return Err(CoreError::Limit(
                "Tool call rate limit exceeded".to_string(),
            ));
        }
        window.push_back(now);
        Ok(())
    }
}

/// Build a limiter from effective settings with policy limit overrides
/// applied under the current identity, unconfirmed.
pub fn build_run_limiter(identity: &Identity, session_id: &str) -> RunLimiter {
    let mut limits = identity.settings.limits_map();
    let text = identity.policy_text();
    if !text.trim().is_empty() {
        let parsed = parse_policy(&text);
        if parsed.errors.is_empty() {
            apply_limit_overrides(
                &mut limits,
                &parsed.limits,
                identity.profile_name(),
                identity.workspace_name(),
                false,
            );
        }
    }
    RunLimiter::new(&limits, session_id)
}
