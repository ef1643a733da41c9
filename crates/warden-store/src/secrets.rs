//! Encrypted secret rows. Values arrive already encrypted; this module never
//! sees plaintext.

use crate::{Store, StoreError};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

impl Store {
    /// Upsert an encrypted secret blob under a unique key name.
    pub fn upsert_secret(&self, key_name: &str, encrypted_value: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO secrets (id, key_name, encrypted_value, updated_at)
             VALUES (?1, ?2, ?3, strftime('%Y-%m-%dT%H:%M:%fZ','now'))
             ON CONFLICT(key_name) DO UPDATE SET
                 encrypted_value = excluded.encrypted_value,
                 updated_at = excluded.updated_at",
            params![Uuid::new_v4().to_string(), key_name, encrypted_value],
        )?;
        Ok(())
    }

    /// Fetch the encrypted blob for a key name.
    pub fn secret_blob(&self, key_name: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock();
        let blob = conn
            .query_row(
                "SELECT encrypted_value FROM secrets WHERE key_name = ?1",
                params![key_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob)
    }

    /// Delete a secret by key name.
    pub fn delete_secret(&self, key_name: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM secrets WHERE key_name = ?1",
            params![key_name],
        )?;
        Ok(())
    }

    /// Whether a secret exists for a key name.
    pub fn has_secret(&self, key_name: &str) -> Result<bool, StoreError> {
        Ok(self.secret_blob(key_name)?.is_some())
    }

    /// List stored key names only. Values are never exposed here.
    pub fn list_secret_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT key_name FROM secrets ORDER BY key_name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(StoreError::Sqlite)
    }
}
