//! Permission grant rows and transactional once-consumption.

use crate::{Store, StoreError, parse_uuid};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Transaction, params};
use uuid::Uuid;
use warden_protocol::{Grant, GrantScope, Permission};

/// Result of a grant lookup with an embedded decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantCheck {
    /// No grant covers the permission for this session.
    Missing,
    /// A grant matched; the decision came from the caller's evaluator.
    Decided {
        /// Whether the check passed.
        allowed: bool,
        /// Reason string for the decision.
        reason: String,
    },
}

impl Store {
    /// Replace any grant for the same permission visible to `session_id`
    /// with `grant`, atomically.
    pub fn replace_grant(&self, grant: &Grant, session_id: &str) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM permission_grants
             WHERE permission = ?1 AND (session_id = ?2 OR session_id IS NULL)",
            params![grant.permission.as_str(), session_id],
        )?;
        tx.execute(
            "INSERT INTO permission_grants (id, permission, scope, session_id, allowed_paths_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                grant.id.to_string(),
                grant.permission.as_str(),
                grant.scope.as_str(),
                grant.session_id,
                serde_json::to_string(&grant.allowed_paths)?,
            ],
        )?;
        tx.commit()?;
        debug!(
            "grant stored (permission={}, scope={})",
            grant.permission, grant.scope
        );
        Ok(())
    }

    /// Select the best-matching grant for `(permission, session_id)`, run the
    /// caller's evaluator against it, and delete the row in the same
    /// transaction when a positive decision consumes a `once` grant.
    ///
    /// The session-bound row wins over the `always` row when both exist. A
    /// negative decision never consumes the grant.
    pub fn check_and_consume_grant<F>(
        &self,
        permission: Permission,
        session_id: &str,
        evaluate: F,
    ) -> Result<GrantCheck, StoreError>
    where
        F: FnOnce(&Grant) -> (bool, String),
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut grants = select_grants(&tx, permission, session_id)?;
        grants.sort_by_key(|grant| {
            if grant.session_id.as_deref() == Some(session_id) {
                0
            } else {
                1
            }
        });
        let Some(grant) = grants.into_iter().next() else {
            return Ok(GrantCheck::Missing);
        };

        let (allowed, reason) = evaluate(&grant);
        if allowed
            && grant.scope == GrantScope::Once
            && grant.session_id.as_deref() == Some(session_id)
        {
            tx.execute(
                "DELETE FROM permission_grants WHERE id = ?1",
                params![grant.id.to_string()],
            )?;
            debug!("once grant consumed (permission={permission})");
        }
        tx.commit()?;
        Ok(GrantCheck::Decided { allowed, reason })
    }

    /// Delete grants for `permission` visible to `session_id`.
    pub fn revoke_grants(&self, permission: Permission, session_id: &str) -> Result<usize, StoreError> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM permission_grants
             WHERE permission = ?1 AND (session_id = ?2 OR session_id IS NULL)",
            params![permission.as_str(), session_id],
        )?;
        Ok(deleted)
    }

    /// List grants visible to `session_id`: its own rows plus `always` rows.
    pub fn list_grants(&self, session_id: &str) -> Result<Vec<Grant>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, permission, scope, session_id, allowed_paths_json, created_at
             FROM permission_grants
             WHERE session_id = ?1 OR session_id IS NULL
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![session_id], raw_grant_row)?;
        rows.map(|row| grant_from_raw(row?)).collect()
    }
}

type RawGrant = (String, String, String, Option<String>, String, DateTime<Utc>);

fn raw_grant_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawGrant> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn select_grants(
    tx: &Transaction<'_>,
    permission: Permission,
    session_id: &str,
) -> Result<Vec<Grant>, StoreError> {
    let mut stmt = tx.prepare(
        "SELECT id, permission, scope, session_id, allowed_paths_json, created_at
         FROM permission_grants
         WHERE permission = ?1 AND (session_id = ?2 OR session_id IS NULL)",
    )?;
    let rows = stmt.query_map(params![permission.as_str(), session_id], raw_grant_row)?;
    rows.map(|row| grant_from_raw(row?)).collect()
}

fn grant_from_raw(raw: RawGrant) -> Result<Grant, StoreError> {
    let (id, permission, scope, session_id, allowed_paths_json, created_at) = raw;
    Ok(Grant {
        id: parse_uuid(&id)?,
        permission: permission
            .parse()
            .map_err(|err: String| StoreError::Corrupt(err))?,
        scope: scope
            .parse()
            .map_err(|err: String| StoreError::Corrupt(err))?,
        session_id,
        allowed_paths: serde_json::from_str(&allowed_paths_json)?,
        created_at,
    })
}
