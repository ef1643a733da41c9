//! Workspace rows: scopes, tool allowlists, and setting overrides.

use crate::model::{NewWorkspace, SettingsMap, WorkspaceRecord};
use crate::{Store, StoreError, parse_uuid};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use uuid::Uuid;

impl Store {
    /// Insert a new workspace with scopes, allowed tools, and settings.
    pub fn insert_workspace(&self, new: &NewWorkspace) -> Result<WorkspaceRecord, StoreError> {
        let id = Uuid::new_v4();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO workspaces (id, name, description, default_profile_id, is_active)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![
                id.to_string(),
                new.name,
                new.description,
                new.default_profile_id.map(|profile| profile.to_string()),
            ],
        )?;
        write_children(&tx, id, &new.scopes, &new.allowed_tools, &new.settings)?;
        tx.commit()?;
        drop(conn);
        debug!("workspace created (name={})", new.name);
        workspace_row(&self.lock(), id)?
            .ok_or_else(|| StoreError::NotFound(format!("workspace {id}")))
    }

    /// Fetch a workspace with its scopes, tools, and settings.
    pub fn workspace(&self, id: Uuid) -> Result<Option<WorkspaceRecord>, StoreError> {
        workspace_row(&self.lock(), id)
    }

    /// Fetch the active workspace, if one is set.
    pub fn active_workspace(&self) -> Result<Option<WorkspaceRecord>, StoreError> {
        let id = {
            let conn = self.lock();
            conn.query_row("SELECT id FROM workspaces WHERE is_active = 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
        };
        match id {
            Some(raw) => workspace_row(&self.lock(), parse_uuid(&raw)?),
            None => Ok(None),
        }
    }

    /// List all workspaces, most recently updated first.
    pub fn list_workspaces(&self) -> Result<Vec<WorkspaceRecord>, StoreError> {
        let ids: Vec<String> = {
            let conn = self.lock();
            let mut stmt =
                conn.prepare("SELECT id FROM workspaces ORDER BY updated_at DESC, rowid DESC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let mut workspaces = Vec::with_capacity(ids.len());
        for raw in ids {
            if let Some(workspace) = workspace_row(&self.lock(), parse_uuid(&raw)?)? {
                workspaces.push(workspace);
            }
        }
        Ok(workspaces)
    }

    /// Replace a workspace's scopes, tools, and settings.
    pub fn update_workspace(
        &self,
        id: Uuid,
        scopes: Option<&[String]>,
        allowed_tools: Option<&[String]>,
        settings: Option<&SettingsMap>,
    ) -> Result<WorkspaceRecord, StoreError> {
        if self.workspace(id)?.is_none() {
            return Err(StoreError::NotFound(format!("workspace {id}")));
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        if let Some(scopes) = scopes {
            tx.execute(
                "DELETE FROM workspace_scopes WHERE workspace_id = ?1",
                params![id.to_string()],
            )?;
            write_scopes(&tx, id, scopes)?;
        }
        if let Some(tools) = allowed_tools {
            tx.execute(
                "DELETE FROM workspace_tools WHERE workspace_id = ?1",
                params![id.to_string()],
            )?;
            write_tools(&tx, id, tools)?;
        }
        if let Some(settings) = settings {
            tx.execute(
                "DELETE FROM workspace_settings WHERE workspace_id = ?1",
                params![id.to_string()],
            )?;
            write_settings(&tx, id, settings)?;
        }
        tx.execute(
            "UPDATE workspaces SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
             WHERE id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;
        drop(conn);
        self.workspace(id)?
            .ok_or_else(|| StoreError::NotFound(format!("workspace {id}")))
    }

    /// Mark a workspace active, deactivating any other. Returns the default
    /// profile id so callers can activate it alongside.
    pub fn activate_workspace(&self, id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let workspace = self
            .workspace(id)?
            .ok_or_else(|| StoreError::NotFound(format!("workspace {id}")))?;
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("UPDATE workspaces SET is_active = 0 WHERE is_active = 1", [])?;
        tx.execute(
            "UPDATE workspaces SET is_active = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;
        debug!("workspace activated (name={})", workspace.name);
        Ok(workspace.default_profile_id)
    }

    /// Delete a workspace with its scopes, tools, and settings.
    pub fn delete_workspace(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for table in ["workspace_scopes", "workspace_tools", "workspace_settings"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE workspace_id = ?1"),
                params![id.to_string()],
            )?;
        }
        tx.execute(
            "DELETE FROM workspaces WHERE id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn write_children(
    tx: &Transaction<'_>,
    id: Uuid,
    scopes: &[String],
    tools: &[String],
    settings: &SettingsMap,
) -> Result<(), StoreError> {
    write_scopes(tx, id, scopes)?;
    write_tools(tx, id, tools)?;
    write_settings(tx, id, settings)?;
    Ok(())
}

fn write_scopes(tx: &Transaction<'_>, id: Uuid, scopes: &[String]) -> Result<(), StoreError> {
    for path in scopes {
        tx.execute(
            "INSERT INTO workspace_scopes (id, workspace_id, path) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), id.to_string(), path],
        )?;
    }
    Ok(())
}

fn write_tools(tx: &Transaction<'_>, id: Uuid, tools: &[String]) -> Result<(), StoreError> {
    for tool in tools {
        tx.execute(
            "INSERT INTO workspace_tools (id, workspace_id, tool_name) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), id.to_string(), tool],
        )?;
    }
    Ok(())
}

fn write_settings(tx: &Transaction<'_>, id: Uuid, settings: &SettingsMap) -> Result<(), StoreError> {
    for (key, value) in settings {
        tx.execute(
            "INSERT OR REPLACE INTO workspace_settings (workspace_id, key, value_json)
             VALUES (?1, ?2, ?3)",
            params![id.to_string(), key, serde_json::to_string(value)?],
        )?;
    }
    Ok(())
}

fn workspace_row(conn: &Connection, id: Uuid) -> Result<Option<WorkspaceRecord>, StoreError> {
    type Raw = (
        String,
        String,
        String,
        Option<String>,
        bool,
        DateTime<Utc>,
        DateTime<Utc>,
    );
    let raw: Option<Raw> = conn
        .query_row(
            "SELECT id, name, description, default_profile_id, is_active, created_at, updated_at
             FROM workspaces WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            },
        )
        .optional()?;
    let Some((raw_id, name, description, default_profile, is_active, created_at, updated_at)) = raw
    else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT path FROM workspace_scopes WHERE workspace_id = ?1 ORDER BY rowid")?;
    let scopes = stmt
        .query_map(params![id.to_string()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn
        .prepare("SELECT tool_name FROM workspace_tools WHERE workspace_id = ?1 ORDER BY rowid")?;
    let allowed_tools = stmt
        .query_map(params![id.to_string()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut settings = SettingsMap::new();
    let mut stmt =
        conn.prepare("SELECT key, value_json FROM workspace_settings WHERE workspace_id = ?1")?;
    let rows = stmt.query_map(params![id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (key, value_json) = row?;
        settings.insert(key, serde_json::from_str(&value_json)?);
    }

    Ok(Some(WorkspaceRecord {
        id: parse_uuid(&raw_id)?,
        name,
        description,
        default_profile_id: match default_profile {
            Some(raw) => Some(parse_uuid(&raw)?),
            None => None,
        },
        is_active,
        scopes,
        allowed_tools,
        settings,
        created_at,
        updated_at,
    }))
}
