//! Canonical audit event type names.

/// A permission was granted.
pub const PERMISSION_GRANT: &str = "permission.grant";
/// A permission was revoked.
pub const PERMISSION_REVOKE: &str = "permission.revoke";
/// A permission check was denied.
pub const PERMISSION_DENIED: &str = "permission.denied";
/// A policy rule denied an action.
pub const POLICY_DENIED: &str = "policy.denied";
/// The active workspace denied a tool.
pub const WORKSPACE_DENIED: &str = "workspace.denied";
/// A budget or rate limit blocked an action.
pub const LIMIT_BLOCKED: &str = "limit.blocked";
/// A tool executed successfully.
pub const TOOL_CALL: &str = "tool.call";
/// A web search executed.
pub const SEARCH_EXECUTE: &str = "search.execute";
/// A model completed a request.
pub const MODEL_USAGE: &str = "model.usage";
/// A model source was registered.
pub const MODEL_SOURCE_ADD: &str = "model.source.add";
/// A model source connectivity test ran.
pub const MODEL_SOURCE_TEST: &str = "model.source.test";
