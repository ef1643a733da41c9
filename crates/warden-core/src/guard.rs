//! Policy guard: the single checkpoint between a request and a tool.

use crate::broker::PermissionBroker;
use crate::decision::Decision;
use crate::error::CoreError;
use crate::identity::IdentityService;
use crate::paths::path_within_scopes;
use crate::policy::{Effect, evaluate_effect, parse_policy};
use log::debug;
use warden_protocol::{Permission, RunMode};

/// Reason signalling that a read may proceed through a quarantine copy.
pub const QUARANTINE_REQUIRED: &str = "Quarantine required";
/// Reason returned when safe mode blocks an elevated permission.
pub const SAFE_MODE_BLOCKED: &str = "Safe mode blocks this permission";
/// Reason returned when no policy text is active.
pub const NO_POLICY_RULES: &str = "No policy rules";
/// Reason returned when a policy rule denies an action.
pub const POLICY_DENIED_ACTION: &str = "Policy denied action";

/// Orchestrates safe mode, broker checks, workspace containment, policy
/// evaluation, and the quarantine signal. Every decision reloads identity
/// from the store; nothing is cached across requests.
#[derive(Clone)]
pub struct PolicyGuard {
    broker: PermissionBroker,
    identity: IdentityService,
}

impl PolicyGuard {
    /// Guard over the shared broker and identity services.
    pub fn new(broker: PermissionBroker, identity: IdentityService) -> Self {
        Self { broker, identity }
    }

    /// Full permission check: safe mode, broker grant, then workspace
    /// containment with the quarantine escape hatch.
    ///
    /// The `Quarantine required` allow is only honored by read-family
    /// tools; the runner treats it as a denial for anything else.
    pub fn assert_allowed(
        &self,
        permission: Permission,
        session_id: &str,
        path: Option<&str>,
        safe_mode: bool,
    ) -> Result<Decision, CoreError> {
        if safe_mode && permission.is_elevated() {
            debug!("safe mode denial (permission={permission})");
            return Ok(Decision::deny(SAFE_MODE_BLOCKED));
        }

        let decision = self.broker.check(permission, session_id, path)?;
        if !decision.allowed {
            return Ok(decision);
        }

        if let Some(path) = path {
            let identity = self.identity.snapshot()?;
            if let Some(workspace) = &identity.workspace
                && !workspace.scopes.is_empty()
            {
                let contained = path_within_scopes(path, &workspace.scopes);
                if !contained.allowed {
                    if identity.settings.quarantine_mode {
                        return Ok(Decision::allow(QUARANTINE_REQUIRED));
                    }
                    return Ok(Decision::deny(format!(
                        "Workspace scope denied: {}",
                        contained.reason
                    )));
                }
            }
        }
        Ok(decision)
    }

    /// Static per-mode tool allowlist.
    pub fn is_tool_allowed_in_mode(&self, tool: &str, mode: RunMode) -> Decision {
        let allowed = match mode {
            RunMode::Chat => matches!(tool, "file_read"),
            RunMode::Workflow => matches!(
                tool,
                "file_read" | "file_write" | "file_list" | "file_read_batch"
            ),
        };
        if allowed {
            Decision::allow("Allowed")
        } else {
            Decision::deny(format!("Tool {tool} is not allowed in mode {mode}"))
        }
    }

    /// Workspace tool allowlist; an empty list means no constraint.
    pub fn is_tool_allowed_in_workspace(&self, tool: &str) -> Result<Decision, CoreError> {
        let identity = self.identity.snapshot()?;
        let Some(workspace) = &identity.workspace else {
            return Ok(Decision::allow("No workspace constraint"));
        };
        if workspace.allowed_tools.is_empty() {
            return Ok(Decision::allow("No workspace tool allowlist"));
        }
        if workspace.allowed_tools.iter().any(|name| name == tool) {
            Ok(Decision::allow("Allowed"))
        } else {
            Ok(Decision::deny(format!(
                "Tool {tool} not allowed by workspace"
            )))
        }
    }

    /// Evaluate the active policy text for an action. Empty text allows;
    /// any parse error makes the policy present-but-unusable and denies
    /// with the first error.
    pub fn policy_allows_action(&self, action: &str, confirmed: bool) -> Result<Decision, CoreError> {
        let identity = self.identity.snapshot()?;
        let text = identity.policy_text();
        if text.trim().is_empty() {
            return Ok(Decision::allow(NO_POLICY_RULES));
        }
        let parsed = parse_policy(&text);
        if let Some(first) = parsed.errors.first() {
            return Ok(Decision::deny(format!("Policy parse errors: {first}")));
        }
        let decision = evaluate_effect(
            &parsed.effects,
            action,
            identity.profile_name(),
            identity.workspace_name(),
            confirmed,
        );
        Ok(match decision {
            Some(Effect::Deny) => Decision::deny(POLICY_DENIED_ACTION),
            _ => Decision::allow("Allowed"),
        })
    }
}
