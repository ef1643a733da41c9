//! Profile service: normalized payloads, history, activation, rollback.

use crate::error::CoreError;
use crate::identity::Settings;
use log::info;
use uuid::Uuid;
use warden_store::{ProfileRecord, SettingsMap, Store};

/// CRUD and activation for settings profiles.
#[derive(Clone)]
pub struct ProfileService {
    store: Store,
}

impl ProfileService {
    /// Service over the shared store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a profile. The payload is merged over registry defaults and
    /// validated; unknown keys such as `policy_rules` are preserved.
    pub fn create(&self, name: &str, payload: &SettingsMap) -> Result<ProfileRecord, CoreError> {
        let normalized = normalize_payload(payload)?;
        Ok(self.store.insert_profile(name, &normalized)?)
    }

    /// Update a profile payload, snapshotting the prior payload first.
    pub fn update(
        &self,
        id: Uuid,
        payload: &SettingsMap,
        name: Option<&str>,
    ) -> Result<ProfileRecord, CoreError> {
        let normalized = normalize_payload(payload)?;
        Ok(self.store.update_profile(id, &normalized, name)?)
    }

    /// Fetch a profile.
    pub fn get(&self, id: Uuid) -> Result<ProfileRecord, CoreError> {
        self.store
            .profile(id)?
            .ok_or_else(|| CoreError::NotFound(format!("profile {id}")))
    }

    /// List profiles, most recently updated first.
    pub fn list(&self) -> Result<Vec<ProfileRecord>, CoreError> {
        Ok(self.store.list_profiles()?)
    }

    /// Activate a profile, applying its payload as effective defaults.
    pub fn activate(&self, id: Uuid) -> Result<ProfileRecord, CoreError> {
        let profile = self.store.activate_profile(id)?;
        info!("profile activated (name={})", profile.name);
        Ok(profile)
    }

    /// Restore the most recent history snapshot as a new version.
    pub fn rollback(&self, id: Uuid) -> Result<ProfileRecord, CoreError> {
        let snapshot = self
            .store
            .latest_profile_snapshot(id)?
            .ok_or_else(|| CoreError::NotFound(format!("no history for profile {id}")))?;
        self.update(id, &snapshot, None)
    }

    /// Delete a profile with its settings and history.
    pub fn delete(&self, id: Uuid) -> Result<(), CoreError> {
        Ok(self.store.delete_profile(id)?)
    }
}

/// Merge a payload over settings defaults, validate known keys, and write
/// the enforced values back while keeping unknown keys.
fn normalize_payload(payload: &SettingsMap) -> Result<SettingsMap, CoreError> {
    let mut merged: SettingsMap = Settings::default().to_map()?;
    for (key, value) in payload {
        merged.insert(key.clone(), value.clone());
    }
    let settings = Settings::from_map(&merged)?;
    for (key, value) in settings.to_map()? {
        merged.insert(key, value);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::ProfileService;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use warden_store::Store;

    #[test]
    fn payload_is_normalized_over_defaults() {
        let store = Store::open_in_memory().expect("store");
        let service = ProfileService::new(store);
        let profile = service
            .create(
                "Research",
                &[
                    ("privacy_mode".to_string(), json!(true)),
                    ("allow_query_text_logging".to_string(), json!(true)),
                    ("policy_rules".to_string(), json!("allow(web.search) always")),
                ]
                .into_iter()
                .collect(),
            )
            .expect("create");

        // Safe-default enforcement overrides the contradictory flag and
        // defaults are filled in; free-form keys survive.
        assert_eq!(profile.payload["allow_query_text_logging"], json!(false));
        assert_eq!(profile.payload["max_tool_calls_per_message"], json!(3));
        assert_eq!(
            profile.payload["policy_rules"],
            json!("allow(web.search) always")
        );
    }

    #[test]
    fn rollback_restores_previous_payload() {
        let store = Store::open_in_memory().expect("store");
        let service = ProfileService::new(store);
        let profile = service
            .create(
                "Versioned",
                &[("verbose_logging".to_string(), json!(false))]
                    .into_iter()
                    .collect(),
            )
            .expect("create");
        service
            .update(
                profile.id,
                &[("verbose_logging".to_string(), json!(true))]
                    .into_iter()
                    .collect(),
                None,
            )
            .expect("update");

        let rolled_back = service.rollback(profile.id).expect("rollback");
        assert_eq!(rolled_back.payload["verbose_logging"], json!(false));
        assert_eq!(rolled_back.version, 3);
    }

    #[test]
    fn invalid_payload_type_is_a_validation_error() {
        let store = Store::open_in_memory().expect("store");
        let service = ProfileService::new(store);
        let err = service
            .create(
                "Broken",
                &[("max_tool_calls_per_message".to_string(), json!("many"))]
                    .into_iter()
                    .collect(),
            )
            .expect_err("invalid");
        assert_eq!(err.to_string().contains("invalid settings"), true);
    }
}
