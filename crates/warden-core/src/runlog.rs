//! Per-run event stream with privacy-aware input storage.

use crate::audit::hash_text;
use crate::error::CoreError;
use crate::identity::IdentityService;
use log::debug;
use serde_json::Value;
use std::time::Instant;
use uuid::Uuid;
use warden_protocol::RunMode;
use warden_store::{RunRecord, Store};

/// Handle for a run between `start_run` and `finish_run`.
#[derive(Debug)]
pub struct OpenRun {
    /// Run id for event appends.
    pub id: Uuid,
    started: Instant,
}

/// Records runs and their ordered event streams.
#[derive(Clone)]
pub struct RunLogger {
    store: Store,
    identity: IdentityService,
}

impl RunLogger {
    /// Logger over the shared store.
    pub fn new(store: Store, identity: IdentityService) -> Self {
        Self { store, identity }
    }

    /// Open a run. The input hash is stored unconditionally; the raw input
    /// only when privacy mode is off and query-text logging is allowed.
    pub fn start_run(
        &self,
        session_id: &str,
        mode: RunMode,
        input_text: &str,
        model_source_id: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<OpenRun, CoreError> {
        let settings = self.identity.effective_settings()?;
        let id = Uuid::new_v4();
        let stored_text = if !settings.privacy_mode && settings.allow_query_text_logging {
            Some(input_text)
        } else {
            None
        };
        self.store.insert_run(
            id,
            session_id,
            mode,
            &hash_text(input_text),
            stored_text,
            model_source_id,
            model_name,
        )?;
        debug!("run started (mode={mode})");
        Ok(OpenRun {
            id,
            started: Instant::now(),
        })
    }

    /// Append one typed event to an open run.
    pub fn log_run_event(
        &self,
        run_id: Uuid,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), CoreError> {
        Ok(self.store.append_run_event(run_id, event_type, payload)?)
    }

    /// Close a run, recording its duration. Must run on every exit path.
    pub fn finish_run(&self, run: &OpenRun) -> Result<(), CoreError> {
        let duration_ms = run.started.elapsed().as_millis() as i64;
        self.store.set_run_duration(run.id, duration_ms)?;
        Ok(())
    }

    /// Fetch a run with its ordered events.
    pub fn get_run(&self, run_id: Uuid) -> Result<RunRecord, CoreError> {
        self.store
            .run(run_id)?
            .ok_or_else(|| CoreError::NotFound(format!("run {run_id}")))
    }

    /// List recent runs, newest first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>, CoreError> {
        Ok(self.store.list_runs(limit)?)
    }
}
