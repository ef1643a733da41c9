//! Workspace service: creation, activation, and scoped overrides.

use crate::error::CoreError;
use crate::identity::Settings;
use log::info;
use uuid::Uuid;
use warden_store::{NewWorkspace, SettingsMap, Store, WorkspaceRecord};

/// CRUD and activation for workspaces.
#[derive(Clone)]
pub struct WorkspaceService {
    store: Store,
}

impl WorkspaceService {
    /// Service over the shared store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a workspace. Setting overrides are type-validated against the
    /// settings schema; only provided keys are stored.
    pub fn create(&self, new: &NewWorkspace) -> Result<WorkspaceRecord, CoreError> {
        validate_overrides(&new.settings)?;
        Ok(self.store.insert_workspace(new)?)
    }

    /// Replace scopes, tools, or setting overrides.
    pub fn update(
        &self,
        id: Uuid,
        scopes: Option<&[String]>,
        allowed_tools: Option<&[String]>,
        settings: Option<&SettingsMap>,
    ) -> Result<WorkspaceRecord, CoreError> {
        if let Some(settings) = settings {
            validate_overrides(settings)?;
        }
        Ok(self
            .store
            .update_workspace(id, scopes, allowed_tools, settings)?)
    }

    /// Fetch a workspace.
    pub fn get(&self, id: Uuid) -> Result<WorkspaceRecord, CoreError> {
        self.store
            .workspace(id)?
            .ok_or_else(|| CoreError::NotFound(format!("workspace {id}")))
    }

    /// List workspaces, most recently updated first.
    pub fn list(&self) -> Result<Vec<WorkspaceRecord>, CoreError> {
        Ok(self.store.list_workspaces()?)
    }

    /// Activate a workspace, and its default profile when one is set.
    pub fn activate(&self, id: Uuid) -> Result<WorkspaceRecord, CoreError> {
        let default_profile = self.store.activate_workspace(id)?;
        if let Some(profile_id) = default_profile
            && let Err(err) = self.store.activate_profile(profile_id)
        {
            // A dangling default profile must not block workspace switch.
            log::warn!("default profile activation failed: {err}");
        }
        let workspace = self.get(id)?;
        info!("workspace activated (name={})", workspace.name);
        Ok(workspace)
    }

    /// Delete a workspace with its scopes, tools, and settings.
    pub fn delete(&self, id: Uuid) -> Result<(), CoreError> {
        Ok(self.store.delete_workspace(id)?)
    }
}

/// Type-check override values against the settings schema without storing
/// defaults for absent keys.
fn validate_overrides(settings: &SettingsMap) -> Result<(), CoreError> {
    let mut merged: SettingsMap = Settings::default().to_map()?;
    for (key, value) in settings {
        merged.insert(key.clone(), value.clone());
    }
    Settings::from_map(&merged)?;
    Ok(())
}
