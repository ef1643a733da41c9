//! App-level settings rows.

use crate::model::SettingsMap;
use crate::{Store, StoreError};
use rusqlite::params;
use serde_json::Value;

impl Store {
    /// Read all persisted app settings.
    pub fn app_settings_map(&self) -> Result<SettingsMap, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT key, value_json FROM app_settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut settings = SettingsMap::new();
        for row in rows {
            let (key, value_json) = row?;
            settings.insert(key, serde_json::from_str(&value_json)?);
        }
        Ok(settings)
    }

    /// Upsert one app setting.
    pub fn set_app_setting(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO app_settings (key, value_json, updated_at)
             VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ','now'))
             ON CONFLICT(key) DO UPDATE SET
                 value_json = excluded.value_json,
                 updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Store;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn settings_upsert_overwrites() {
        let store = Store::open_in_memory().expect("store");
        store
            .set_app_setting("privacy_mode", &json!(true))
            .expect("set");
        store
            .set_app_setting("privacy_mode", &json!(false))
            .expect("overwrite");

        let settings = store.app_settings_map().expect("read");
        assert_eq!(settings["privacy_mode"], json!(false));
    }
}
