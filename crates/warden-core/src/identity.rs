//! Effective settings and the active-identity snapshot.
//!
//! The snapshot is loaded from the store on every request and never cached
//! longer than one call chain; mutation paths write straight through to the
//! store.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use warden_store::{ProfileRecord, SettingsMap, Store, WorkspaceRecord};

/// Settings key holding policy DSL text in profile and workspace payloads.
pub const POLICY_RULES_KEY: &str = "policy_rules";

/// Validated application settings with safe defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether new sessions start in safe mode.
    pub safe_mode_default: bool,
    /// Privacy mode blocks raw query logging regardless of other flags.
    pub privacy_mode: bool,
    /// Whether audit payloads pass through redaction.
    pub redaction_enabled: bool,
    /// Whether raw query text may be logged (only with privacy mode off).
    pub allow_query_text_logging: bool,
    /// Whether audit payloads keep full detail.
    pub verbose_logging: bool,
    /// Tool call budget per message.
    pub max_tool_calls_per_message: u64,
    /// Tool call rate per minute per session.
    pub max_tool_calls_per_minute: u64,
    /// File read count budget per run.
    pub max_files_read_per_run: u64,
    /// File read byte budget per run.
    pub max_bytes_read_per_run: u64,
    /// Wall clock budget per run in seconds.
    pub max_runtime_seconds: u64,
    /// Whether writes default to preview-only until confirmed.
    pub write_preview_default: bool,
    /// Whether out-of-workspace reads go through quarantine copies.
    pub quarantine_mode: bool,
    /// Preferred search provider name.
    pub search_provider: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            safe_mode_default: true,
            privacy_mode: true,
            redaction_enabled: true,
            allow_query_text_logging: false,
            verbose_logging: false,
            max_tool_calls_per_message: 3,
            max_tool_calls_per_minute: 15,
            max_files_read_per_run: 20,
            max_bytes_read_per_run: 5_000_000,
            max_runtime_seconds: 120,
            write_preview_default: true,
            quarantine_mode: true,
            search_provider: "duckduckgo_html".to_string(),
        }
    }
}

impl Settings {
    /// Deserialize settings from a key/value map, ignoring unknown keys and
    /// enforcing safe defaults afterwards.
    pub fn from_map(map: &SettingsMap) -> Result<Self, CoreError> {
        let object = Value::Object(map.clone().into_iter().collect());
        let mut settings: Settings = serde_json::from_value(object)
            .map_err(|err| CoreError::Validation(format!("invalid settings: {err}")))?;
        settings.enforce_safe_defaults();
        Ok(settings)
    }

    /// Privacy mode always wins over the query-text logging flag.
    pub fn enforce_safe_defaults(&mut self) {
        if self.privacy_mode {
            self.allow_query_text_logging = false;
        }
    }

    /// Serialize into a settings map.
    pub fn to_map(&self) -> Result<SettingsMap, CoreError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(CoreError::Validation(
                "settings did not serialize to an object".to_string(),
            )),
        }
    }

    /// The budget fields as a named map for policy limit overrides.
    pub fn limits_map(&self) -> BTreeMap<String, u64> {
        BTreeMap::from([
            (
                "max_tool_calls_per_message".to_string(),
                self.max_tool_calls_per_message,
            ),
            (
                "max_tool_calls_per_minute".to_string(),
                self.max_tool_calls_per_minute,
            ),
            (
                "max_files_read_per_run".to_string(),
                self.max_files_read_per_run,
            ),
            (
                "max_bytes_read_per_run".to_string(),
                self.max_bytes_read_per_run,
            ),
            ("max_runtime_seconds".to_string(), self.max_runtime_seconds),
        ])
    }
}

/// Point-in-time view of the active profile, workspace, and effective
/// settings.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Active profile, if any.
    pub profile: Option<ProfileRecord>,
    /// Active workspace, if any.
    pub workspace: Option<WorkspaceRecord>,
    /// App settings merged with workspace overrides, safe defaults applied.
    pub settings: Settings,
}

impl Identity {
    /// Name of the active profile.
    pub fn profile_name(&self) -> Option<&str> {
        self.profile.as_ref().map(|profile| profile.name.as_str())
    }

    /// Name of the active workspace.
    pub fn workspace_name(&self) -> Option<&str> {
        self.workspace
            .as_ref()
            .map(|workspace| workspace.name.as_str())
    }

    /// Path scopes of the active workspace.
    pub fn workspace_scopes(&self) -> &[String] {
        self.workspace
            .as_ref()
            .map(|workspace| workspace.scopes.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated policy text from the active profile and workspace.
    pub fn policy_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(profile) = &self.profile
            && let Some(Value::String(rules)) = profile.payload.get(POLICY_RULES_KEY)
            && !rules.trim().is_empty()
        {
            parts.push(rules.clone());
        }
        if let Some(workspace) = &self.workspace
            && let Some(Value::String(rules)) = workspace.settings.get(POLICY_RULES_KEY)
            && !rules.trim().is_empty()
        {
            parts.push(rules.clone());
        }
        parts.join("\n")
    }
}

/// Loads identity snapshots from the store.
#[derive(Clone)]
pub struct IdentityService {
    store: Store,
}

impl IdentityService {
    /// Service over the shared store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Load the current identity snapshot.
    pub fn snapshot(&self) -> Result<Identity, CoreError> {
        let profile = self.store.active_profile()?;
        let workspace = self.store.active_workspace()?;
        let mut merged = self.store.app_settings_map()?;
        if let Some(workspace) = &workspace {
            for (key, value) in &workspace.settings {
                merged.insert(key.clone(), value.clone());
            }
        }
        let settings = Settings::from_map(&merged)?;
        Ok(Identity {
            profile,
            workspace,
            settings,
        })
    }

    /// Load only the effective settings.
    pub fn effective_settings(&self) -> Result<Settings, CoreError> {
        Ok(self.snapshot()?.settings)
    }
}
