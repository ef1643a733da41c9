//! Run rows and their append-only event streams.

use crate::model::{RunEventRecord, RunRecord};
use crate::{Store, StoreError, parse_uuid};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use uuid::Uuid;
use warden_protocol::RunMode;

impl Store {
    /// Insert a run row at the start of a logical flow.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_run(
        &self,
        id: Uuid,
        session_id: &str,
        mode: RunMode,
        input_hash: &str,
        input_text: Option<&str>,
        model_source_id: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO runs (id, session_id, mode, input_hash, input_text, model_source_id, model_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                session_id,
                mode.as_str(),
                input_hash,
                input_text,
                model_source_id,
                model_name,
            ],
        )?;
        Ok(())
    }

    /// Append one event to an open run.
    pub fn append_run_event(
        &self,
        run_id: Uuid,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO run_events (id, run_id, event_type, payload_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                run_id.to_string(),
                event_type,
                serde_json::to_string(payload)?,
            ],
        )?;
        Ok(())
    }

    /// Record the total duration when a run finishes.
    pub fn set_run_duration(&self, run_id: Uuid, duration_ms: i64) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE runs SET duration_ms = ?1 WHERE id = ?2",
            params![duration_ms, run_id.to_string()],
        )?;
        Ok(())
    }

    /// Fetch one run with its ordered events.
    pub fn run(&self, run_id: Uuid) -> Result<Option<RunRecord>, StoreError> {
        let conn = self.lock();
        let Some(mut record) = run_row(&conn, run_id)? else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT event_type, payload_json, created_at
             FROM run_events
             WHERE run_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![run_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, DateTime<Utc>>(2)?,
            ))
        })?;
        for row in rows {
            let (event_type, payload_json, created_at) = row?;
            record.events.push(RunEventRecord {
                event_type,
                payload: serde_json::from_str(&payload_json)?,
                created_at,
            });
        }
        Ok(Some(record))
    }

    /// List recent runs without events, newest first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let ids: Vec<String> = {
            let conn = self.lock();
            let mut stmt = conn.prepare(
                "SELECT id FROM runs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let conn = self.lock();
        let mut records = Vec::with_capacity(ids.len());
        for raw in ids {
            if let Some(record) = run_row(&conn, parse_uuid(&raw)?)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn run_row(conn: &Connection, run_id: Uuid) -> Result<Option<RunRecord>, StoreError> {
    type Raw = (
        String,
        String,
        String,
        String,
        Option<String>,
        Option<String>,
        Option<String>,
        i64,
        DateTime<Utc>,
    );
    let raw: Option<Raw> = conn
        .query_row(
            "SELECT id, session_id, mode, input_hash, input_text, model_source_id, model_name,
                    duration_ms, created_at
             FROM runs WHERE id = ?1",
            params![run_id.to_string()],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            },
        )
        .optional()?;
    let Some((
        id,
        session_id,
        mode,
        input_hash,
        input_text,
        model_source_id,
        model_name,
        duration_ms,
        created_at,
    )) = raw
    else {
        return Ok(None);
    };
    Ok(Some(RunRecord {
        id: parse_uuid(&id)?,
        session_id,
        mode: mode
            .parse::<RunMode>()
            .map_err(StoreError::Corrupt)?,
        input_hash,
        input_text,
        model_source_id,
        model_name,
        duration_ms,
        created_at,
        events: Vec::new(),
    }))
}
