//! Default-deny permission broker over the grant store.

use crate::audit::AuditWriter;
use crate::decision::Decision;
use crate::error::CoreError;
use crate::paths::{normalize_path, path_within_scopes};
use chrono::Utc;
use log::info;
use serde_json::json;
use uuid::Uuid;
use warden_protocol::{Grant, GrantScope, Permission, events};
use warden_store::{GrantCheck, Store};

/// Reason returned when a check passes.
pub const GRANTED: &str = "Granted";
/// Reason returned when no grant covers the permission.
pub const NO_GRANT: &str = "No grant found";

/// Parameters for granting a permission.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    /// Permission to grant.
    pub permission: Permission,
    /// Grant lifetime.
    pub scope: GrantScope,
    /// Path scopes, expanded and absolutized before storage.
    pub allowed_paths: Vec<String>,
}

/// Broker mediating grant storage and checks.
///
/// A missing grant is a denial, never an error; callers translate denials
/// into typed permission errors.
#[derive(Clone)]
pub struct PermissionBroker {
    store: Store,
    audit: AuditWriter,
}

impl PermissionBroker {
    /// Broker over the shared store.
    pub fn new(store: Store, audit: AuditWriter) -> Self {
        Self { store, audit }
    }

    /// Store a grant, replacing any prior grant for the same permission
    /// visible to this session. `always` grants drop the session binding.
    pub fn grant(&self, request: &GrantRequest, session_id: &str) -> Result<(), CoreError> {
        let session_value = if request.scope == GrantScope::Always {
            None
        } else {
            Some(session_id.to_string())
        };
        let allowed_paths = request
            .allowed_paths
            .iter()
            .map(|path| normalize_path(path).display().to_string())
            .collect();
        let grant = Grant {
            id: Uuid::new_v4(),
            permission: request.permission,
            scope: request.scope,
            session_id: session_value,
            allowed_paths,
            created_at: Utc::now(),
        };
        self.store.replace_grant(&grant, session_id)?;
        info!(
            "permission granted (permission={}, scope={})",
            request.permission, request.scope
        );
        self.audit.log_event(
            events::PERMISSION_GRANT,
            &format!("Granted {} with scope {}", request.permission, request.scope),
            json!({
                "permission": request.permission.as_str(),
                "scope": request.scope.as_str(),
            }),
            Some(session_id),
        )?;
        Ok(())
    }

    /// Check a permission, optionally against a path.
    ///
    /// The session-bound grant wins over the `always` grant. A `once` grant
    /// is consumed atomically with the positive decision; a path denial
    /// leaves it in place.
    pub fn check(
        &self,
        permission: Permission,
        session_id: &str,
        path: Option<&str>,
    ) -> Result<Decision, CoreError> {
        let check = self
            .store
            .check_and_consume_grant(permission, session_id, |grant| {
                if let Some(path) = path {
                    let contained = path_within_scopes(path, &grant.allowed_paths);
                    if !contained.allowed {
                        return (false, contained.reason);
                    }
                }
                (true, GRANTED.to_string())
            })?;
        Ok(match check {
            GrantCheck::Missing => Decision::deny(NO_GRANT),
            GrantCheck::Decided { allowed, reason } => Decision { allowed, reason },
        })
    }

    /// Delete grants for a permission visible to this session.
    pub fn revoke(&self, permission: Permission, session_id: &str) -> Result<(), CoreError> {
        self.store.revoke_grants(permission, session_id)?;
        self.audit.log_event(
            events::PERMISSION_REVOKE,
            &format!("Revoked {permission}"),
            json!({"permission": permission.as_str()}),
            Some(session_id),
        )?;
        Ok(())
    }

    /// List grants visible to this session.
    pub fn list(&self, session_id: &str) -> Result<Vec<Grant>, CoreError> {
        Ok(self.store.list_grants(session_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{GRANTED, GrantRequest, NO_GRANT, PermissionBroker};
    use crate::audit::AuditWriter;
    use crate::identity::IdentityService;
    use crate::paths::OUTSIDE_SCOPES;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use warden_protocol::{GrantScope, Permission};
    use warden_store::Store;

    fn broker(store: &Store) -> PermissionBroker {
        let identity = IdentityService::new(store.clone());
        PermissionBroker::new(store.clone(), AuditWriter::new(store.clone(), identity))
    }

    #[test]
    fn missing_grant_is_a_denial_not_an_error() {
        let store = Store::open_in_memory().expect("store");
        let decision = broker(&store)
            .check(Permission::ClipboardRead, "s1", None)
            .expect("check");
        assert_eq!(decision.allowed, false);
        assert_eq!(decision.reason, NO_GRANT);
    }

    #[test]
    fn once_grant_consumed_only_by_successful_check() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().join("base");
        std::fs::create_dir(&base).expect("mkdir");
        std::fs::write(base.join("a.txt"), "hello").expect("write");
        let outside = dir.path().join("outside.txt");
        std::fs::write(&outside, "x").expect("write");

        let store = Store::open_in_memory().expect("store");
        let broker = broker(&store);
        broker
            .grant(
                &GrantRequest {
                    permission: Permission::FilesystemRead,
                    scope: GrantScope::Once,
                    allowed_paths: vec![base.display().to_string()],
                },
                "s1",
            )
            .expect("grant");

        // A path denial must not consume the grant.
        let denied = broker
            .check(
                Permission::FilesystemRead,
                "s1",
                Some(&outside.display().to_string()),
            )
            .expect("check");
        assert_eq!(denied.allowed, false);
        assert_eq!(denied.reason, OUTSIDE_SCOPES);

        let first = broker
            .check(
                Permission::FilesystemRead,
                "s1",
                Some(&base.join("a.txt").display().to_string()),
            )
            .expect("check");
        assert_eq!(first.allowed, true);
        assert_eq!(first.reason, GRANTED);

        let second = broker
            .check(
                Permission::FilesystemRead,
                "s1",
                Some(&base.join("a.txt").display().to_string()),
            )
            .expect("check");
        assert_eq!(second.allowed, false);
        assert_eq!(second.reason, NO_GRANT);
    }

    #[test]
    fn always_grant_spans_sessions() {
        let store = Store::open_in_memory().expect("store");
        let broker = broker(&store);
        broker
            .grant(
                &GrantRequest {
                    permission: Permission::WebSearch,
                    scope: GrantScope::Always,
                    allowed_paths: vec![],
                },
                "granting-session",
            )
            .expect("grant");

        let decision = broker
            .check(Permission::WebSearch, "another-session", None)
            .expect("check");
        assert_eq!(decision.allowed, true);
    }

    #[test]
    fn grant_and_revoke_leave_audit_entries() {
        let store = Store::open_in_memory().expect("store");
        let broker = broker(&store);
        broker
            .grant(
                &GrantRequest {
                    permission: Permission::ClipboardWrite,
                    scope: GrantScope::Session,
                    allowed_paths: vec![],
                },
                "s1",
            )
            .expect("grant");
        broker
            .revoke(Permission::ClipboardWrite, "s1")
            .expect("revoke");

        let records = store.list_audit(10).expect("audit");
        let types: Vec<&str> = records
            .iter()
            .map(|record| record.event_type.as_str())
            .collect();
        assert_eq!(types.contains(&"permission.grant"), true);
        assert_eq!(types.contains(&"permission.revoke"), true);
        assert_eq!(
            broker.list("s1").expect("list").len(),
            0
        );
    }
}
