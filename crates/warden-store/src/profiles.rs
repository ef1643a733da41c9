//! Profile rows, history snapshots, and activation.

use crate::model::{ProfileRecord, SettingsMap};
use crate::{PROFILE_HISTORY_LIMIT, Store, StoreError, parse_uuid};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

impl Store {
    /// Insert a new profile with its payload and an initial history snapshot.
    pub fn insert_profile(
        &self,
        name: &str,
        payload: &SettingsMap,
    ) -> Result<ProfileRecord, StoreError> {
        let id = Uuid::new_v4();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO profiles (id, name, version, is_active) VALUES (?1, ?2, 1, 0)",
            params![id.to_string(), name],
        )?;
        write_payload(&tx, id, payload)?;
        append_snapshot(&tx, id, payload)?;
        tx.commit()?;
        drop(conn);
        debug!("profile created (name={name})");
        profile_row(&self.lock(), id)?
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))
    }

    /// Fetch a profile with its payload.
    pub fn profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, StoreError> {
        profile_row(&self.lock(), id)
    }

    /// Fetch the active profile, if one is set.
    pub fn active_profile(&self) -> Result<Option<ProfileRecord>, StoreError> {
        let id = {
            let conn = self.lock();
            conn.query_row("SELECT id FROM profiles WHERE is_active = 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
        };
        match id {
            Some(raw) => profile_row(&self.lock(), parse_uuid(&raw)?),
            None => Ok(None),
        }
    }

    /// List all profiles, most recently updated first.
    pub fn list_profiles(&self) -> Result<Vec<ProfileRecord>, StoreError> {
        let ids: Vec<String> = {
            let conn = self.lock();
            let mut stmt =
                conn.prepare("SELECT id FROM profiles ORDER BY updated_at DESC, rowid DESC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let mut profiles = Vec::with_capacity(ids.len());
        for raw in ids {
            if let Some(profile) = profile_row(&self.lock(), parse_uuid(&raw)?)? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    /// Snapshot the current payload, then replace it with `payload` and bump
    /// the version. History is trimmed to the retention cap.
    pub fn update_profile(
        &self,
        id: Uuid,
        payload: &SettingsMap,
        name: Option<&str>,
    ) -> Result<ProfileRecord, StoreError> {
        let current = self
            .profile(id)?
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))?;
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        append_snapshot(&tx, id, &current.payload)?;
        match name {
            Some(name) => tx.execute(
                "UPDATE profiles
                 SET name = ?1, version = version + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?2",
                params![name, id.to_string()],
            )?,
            None => tx.execute(
                "UPDATE profiles
                 SET version = version + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE id = ?1",
                params![id.to_string()],
            )?,
        };
        tx.execute(
            "DELETE FROM profile_settings WHERE profile_id = ?1",
            params![id.to_string()],
        )?;
        write_payload(&tx, id, payload)?;
        tx.commit()?;
        drop(conn);
        self.profile(id)?
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))
    }

    /// Return the most recent history snapshot for a profile.
    pub fn latest_profile_snapshot(&self, id: Uuid) -> Result<Option<SettingsMap>, StoreError> {
        let conn = self.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT snapshot_json FROM profile_history
                 WHERE profile_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Count retained history snapshots for a profile.
    pub fn profile_history_len(&self, id: Uuid) -> Result<usize, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM profile_history WHERE profile_id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Mark a profile active (deactivating any other) and apply its payload
    /// to app settings so it becomes the effective default.
    pub fn activate_profile(&self, id: Uuid) -> Result<ProfileRecord, StoreError> {
        let profile = self
            .profile(id)?
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))?;
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("UPDATE profiles SET is_active = 0 WHERE is_active = 1", [])?;
        tx.execute(
            "UPDATE profiles SET is_active = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        for (key, value) in &profile.payload {
            tx.execute(
                "INSERT INTO app_settings (key, value_json, updated_at)
                 VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ','now'))
                 ON CONFLICT(key) DO UPDATE SET
                     value_json = excluded.value_json,
                     updated_at = excluded.updated_at",
                params![key, serde_json::to_string(value)?],
            )?;
        }
        tx.commit()?;
        drop(conn);
        debug!("profile activated (name={})", profile.name);
        self.profile(id)?
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))
    }

    /// Delete a profile with its settings and history.
    pub fn delete_profile(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM profile_history WHERE profile_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM profile_settings WHERE profile_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute("DELETE FROM profiles WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(())
    }
}

fn write_payload(
    tx: &rusqlite::Transaction<'_>,
    id: Uuid,
    payload: &SettingsMap,
) -> Result<(), StoreError> {
    for (key, value) in payload {
        tx.execute(
            "INSERT OR REPLACE INTO profile_settings (profile_id, key, value_json)
             VALUES (?1, ?2, ?3)",
            params![id.to_string(), key, serde_json::to_string(value)?],
        )?;
    }
    Ok(())
}

fn append_snapshot(
    tx: &rusqlite::Transaction<'_>,
    id: Uuid,
    payload: &SettingsMap,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO profile_history (id, profile_id, snapshot_json) VALUES (?1, ?2, ?3)",
        params![
            Uuid::new_v4().to_string(),
            id.to_string(),
            serde_json::to_string(payload)?,
        ],
    )?;
    let stale: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT id FROM profile_history
             WHERE profile_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| row.get(0))?;
        rows.skip(PROFILE_HISTORY_LIMIT).collect::<Result<_, _>>()?
    };
    for history_id in stale {
        tx.execute(
            "DELETE FROM profile_history WHERE id = ?1",
            params![history_id],
        )?;
    }
    Ok(())
}

fn profile_row(conn: &Connection, id: Uuid) -> Result<Option<ProfileRecord>, StoreError> {
    type Raw = (String, String, i64, bool, DateTime<Utc>, DateTime<Utc>);
    let raw: Option<Raw> = conn
        .query_row(
            "SELECT id, name, version, is_active, created_at, updated_at
             FROM profiles WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )
        .optional()?;
    let Some((raw_id, name, version, is_active, created_at, updated_at)) = raw else {
        return Ok(None);
    };

    let mut payload = SettingsMap::new();
    let mut stmt =
        conn.prepare("SELECT key, value_json FROM profile_settings WHERE profile_id = ?1")?;
    let rows = stmt.query_map(params![id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (key, value_json) = row?;
        payload.insert(key, serde_json::from_str(&value_json)?);
    }

    Ok(Some(ProfileRecord {
        id: parse_uuid(&raw_id)?,
        name,
        version,
        is_active,
        payload,
        created_at,
        updated_at,
    }))
}
