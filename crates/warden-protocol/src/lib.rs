//! Wire and domain types shared across the Warden backend.

mod search;
mod tool;
mod worker;

pub mod events;

pub use search::{SearchResponse, SearchResult, SearchStatus};
pub use tool::ToolError;
pub use worker::{WorkerRequest, WorkerResponse};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Client-supplied identifier that scopes grants and rate limits.
pub type SessionId = String;

/// Closed set of permissions a grant can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Read files under granted path scopes.
    #[serde(rename = "filesystem.read")]
    FilesystemRead,
    /// Write files under granted path scopes.
    #[serde(rename = "filesystem.write")]
    FilesystemWrite,
    /// Query external search providers.
    #[serde(rename = "web.search")]
    WebSearch,
    /// Capture the screen.
    #[serde(rename = "screen.capture")]
    ScreenCapture,
    /// Read the system clipboard.
    #[serde(rename = "clipboard.read")]
    ClipboardRead,
    /// Write the system clipboard.
    #[serde(rename = "clipboard.write")]
    ClipboardWrite,
    /// Run external processes.
    #[serde(rename = "process.run")]
    ProcessRun,
}

impl Permission {
    /// Stable string form used in storage and audit payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::FilesystemRead => "filesystem.read",
            Permission::FilesystemWrite => "filesystem.write",
            Permission::WebSearch => "web.search",
            Permission::ScreenCapture => "screen.capture",
            Permission::ClipboardRead => "clipboard.read",
            Permission::ClipboardWrite => "clipboard.write",
            Permission::ProcessRun => "process.run",
        }
    }

    /// Whether safe mode blocks this permission outright.
    pub fn is_elevated(&self) -> bool {
        matches!(
            self,
            Permission::WebSearch
                | Permission::ScreenCapture
                | Permission::ClipboardRead
                | Permission::ClipboardWrite
                | Permission::ProcessRun
        )
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "filesystem.read" => Ok(Permission::FilesystemRead),
            "filesystem.write" => Ok(Permission::FilesystemWrite),
            "web.search" => Ok(Permission::WebSearch),
            "screen.capture" => Ok(Permission::ScreenCapture),
            "clipboard.read" => Ok(Permission::ClipboardRead),
            "clipboard.write" => Ok(Permission::ClipboardWrite),
            "process.run" => Ok(Permission::ProcessRun),
            other => Err(format!("unknown permission: {other}")),
        }
    }
}

/// Lifetime of a permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantScope {
    /// Self-destructs after the first successful check.
    Once,
    /// Bound to the granting session.
    Session,
    /// Valid for any session.
    Always,
}

impl GrantScope {
    /// Stable string form used in storage and audit payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantScope::Once => "once",
            GrantScope::Session => "session",
            GrantScope::Always => "always",
        }
    }
}

impl fmt::Display for GrantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "once" => Ok(GrantScope::Once),
            "session" => Ok(GrantScope::Session),
            "always" => Ok(GrantScope::Always),
            other => Err(format!("unknown grant scope: {other}")),
        }
    }
}

/// A stored permission grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    /// Unique grant id.
    pub id: Uuid,
    /// Permission covered by the grant.
    pub permission: Permission,
    /// Lifetime of the grant.
    pub scope: GrantScope,
    /// Owning session, or none for `always` grants.
    pub session_id: Option<SessionId>,
    /// Absolute path scopes the grant applies to. Empty means unscoped.
    pub allowed_paths: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Execution mode of a logical run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Interactive chat turn.
    Chat,
    /// Workflow step execution.
    Workflow,
}

impl RunMode {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Chat => "chat",
            RunMode::Workflow => "workflow",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "chat" => Ok(RunMode::Chat),
            "workflow" => Ok(RunMode::Workflow),
            other => Err(format!("unknown run mode: {other}")),
        }
    }
}

/// Permission a tool declares it needs before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequirement {
    /// Required permission.
    pub permission: Permission,
    /// Whether the check is scoped to the `path` argument.
    pub path_scoped: bool,
}

impl PermissionRequirement {
    /// Requirement without path scoping.
    pub fn unscoped(permission: Permission) -> Self {
        Self {
            permission,
            path_scoped: false,
        }
    }

    /// Requirement checked against the tool's `path` argument.
    pub fn path_scoped(permission: Permission) -> Self {
        Self {
            permission,
            path_scoped: true,
        }
    }
}
