//! Row models returned by store queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;
use warden_protocol::RunMode;

/// Key/value settings payload used by profiles, workspaces, and app settings.
pub type SettingsMap = BTreeMap<String, Value>;

/// A settings profile with its full key/value payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Unique profile id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Monotonic version, bumped on every update.
    pub version: i64,
    /// Whether this is the active profile.
    pub is_active: bool,
    /// Settings payload.
    pub payload: SettingsMap,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A workspace with scopes, tool allowlist, and setting overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// Unique workspace id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Profile activated alongside this workspace, if any.
    pub default_profile_id: Option<Uuid>,
    /// Whether this is the active workspace.
    pub is_active: bool,
    /// Allowed path scopes.
    pub scopes: Vec<String>,
    /// Explicit tool allowlist. Empty means no constraint.
    pub allowed_tools: Vec<String>,
    /// Setting overrides applied on top of app settings.
    pub settings: SettingsMap,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a workspace.
#[derive(Debug, Clone, Default)]
pub struct NewWorkspace {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Allowed path scopes.
    pub scopes: Vec<String>,
    /// Explicit tool allowlist.
    pub allowed_tools: Vec<String>,
    /// Setting overrides.
    pub settings: SettingsMap,
    /// Profile activated alongside this workspace.
    pub default_profile_id: Option<Uuid>,
}

/// One audit log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique entry id.
    pub id: Uuid,
    /// Session the event belongs to, if any.
    pub session_id: Option<String>,
    /// Canonical event type name.
    pub event_type: String,
    /// One-line summary.
    pub summary: String,
    /// Redacted payload.
    pub payload: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// One recorded run with its events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run id.
    pub id: Uuid,
    /// Owning session.
    pub session_id: String,
    /// Execution mode.
    pub mode: RunMode,
    /// Hash of the input text, always stored.
    pub input_hash: String,
    /// Raw input text, stored only when privacy settings allow it.
    pub input_text: Option<String>,
    /// Model source used for the run, if any.
    pub model_source_id: Option<String>,
    /// Model name used for the run, if any.
    pub model_name: Option<String>,
    /// Total duration, written when the run finishes.
    pub duration_ms: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Ordered run events. Empty in list queries.
    #[serde(default)]
    pub events: Vec<RunEventRecord>,
}

/// One event appended to an open run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEventRecord {
    /// Event type name.
    pub event_type: String,
    /// Event payload.
    pub payload: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
