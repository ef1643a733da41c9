//! Append-only audit log rows.

use crate::model::AuditRecord;
use crate::{Store, StoreError, parse_uuid};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;
use uuid::Uuid;

impl Store {
    /// Append one audit entry. The payload must already be redacted.
    pub fn insert_audit(
        &self,
        session_id: Option<&str>,
        event_type: &str,
        summary: &str,
        payload: &Value,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO audit_logs (id, session_id, event_type, summary, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                session_id,
                event_type,
                summary,
                serde_json::to_string(payload)?,
            ],
        )?;
        Ok(())
    }

    /// List recent audit entries, newest first.
    pub fn list_audit(&self, limit: usize) -> Result<Vec<AuditRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, event_type, summary, payload_json, created_at
             FROM audit_logs
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        type Raw = (
            String,
            Option<String>,
            String,
            String,
            String,
            DateTime<Utc>,
        );
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok::<Raw, _>((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (id, session_id, event_type, summary, payload_json, created_at) = row?;
            records.push(AuditRecord {
                id: parse_uuid(&id)?,
                session_id,
                event_type,
                summary,
                payload: serde_json::from_str(&payload_json)?,
                created_at,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use crate::Store;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn audit_entries_list_newest_first() {
        let store = Store::open_in_memory().expect("store");
        store
            .insert_audit(Some("s1"), "permission.grant", "first", &json!({}))
            .expect("first");
        store
            .insert_audit(None, "tool.call", "second", &json!({"tool": "file_read"}))
            .expect("second");

        let records = store.list_audit(10).expect("list");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_type, "tool.call");
        assert_eq!(records[0].session_id, None);
        assert_eq!(records[1].summary, "first");
    }

    #[test]
    fn list_respects_limit() {
        let store = Store::open_in_memory().expect("store");
        for index in 0..5 {
            store
                .insert_audit(None, "tool.call", &format!("entry {index}"), &json!({}))
                .expect("insert");
        }
        assert_eq!(store.list_audit(3).expect("list").len(), 3);
    }
}
