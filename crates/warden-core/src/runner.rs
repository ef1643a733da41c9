//! Tool runner: the only authorized path from a tool request to a worker
//! process.
//!
//! The denial order is fixed: mode, workspace tool allowlist, policy,
//! per-requirement permission with path containment, then limits. Each
//! denial short-circuits and leaves a typed audit entry. Only after every
//! gate passes is a worker spawned.

use crate::audit::{AuditWriter, canonical_json, hash_text};
use crate::broker::PermissionBroker;
use crate::error::CoreError;
use crate::guard::{PolicyGuard, QUARANTINE_REQUIRED};
use crate::identity::IdentityService;
use crate::limits::{RateLimiter, RunLimiter};
use crate::paths::path_within_scopes;
use crate::runlog::RunLogger;
use log::{debug, info};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use warden_protocol::{Grant, Permission, RunMode, WorkerRequest, WorkerResponse, events};
use warden_sandbox::WorkerLauncher;
use warden_store::Store;
use warden_tools::ToolRegistry;

/// Per-session quarantine area under the app data dir.
const QUARANTINE_DIR: &str = "quarantine";
/// Per-session scratch directory workers run in.
const TOOL_RUNS_DIR: &str = "tool_runs";

const ARGS_SAMPLE_CHARS: usize = 300;
const RESULT_SAMPLE_CHARS: usize = 600;

fn is_read_family(tool: &str) -> bool {
    matches!(tool, "file_read" | "file_list" | "file_read_batch")
}

fn is_quarantine_candidate(tool: &str) -> bool {
    matches!(tool, "file_read" | "file_read_batch")
}

/// One tool invocation request.
#[derive(Debug, Clone)]
pub struct ToolRunRequest {
    /// Tool name.
    pub tool: String,
    /// Tool arguments.
    pub args: Value,
    /// Requesting session.
    pub session_id: String,
    /// Whether safe mode applies to permission checks.
    pub safe_mode: bool,
    /// Execution mode for the static tool allowlist.
    pub mode: RunMode,
    /// Open run to mirror the `tool.call` event into.
    pub run_id: Option<Uuid>,
}

/// Executes tool plugins in worker subprocesses under the full guard chain.
#[derive(Clone)]
pub struct ToolRunner {
    registry: ToolRegistry,
    guard: PolicyGuard,
    broker: PermissionBroker,
    audit: AuditWriter,
    runlog: RunLogger,
    identity: IdentityService,
    rate: Arc<RateLimiter>,
    launcher: WorkerLauncher,
    data_dir: PathBuf,
}

impl ToolRunner {
    /// Assemble a runner and its services over the shared store.
    pub fn new(
        store: Store,
        registry: ToolRegistry,
        launcher: WorkerLauncher,
        data_dir: PathBuf,
    ) -> Self {
        let identity = IdentityService::new(store.clone());
        let audit = AuditWriter::new(store.clone(), identity.clone());
        let broker = PermissionBroker::new(store.clone(), audit.clone());
        let guard = PolicyGuard::new(broker.clone(), identity.clone());
        let runlog = RunLogger::new(store, identity.clone());
        Self {
            registry,
            guard,
            broker,
            audit,
            runlog,
            identity,
            rate: Arc::new(RateLimiter::new()),
            launcher,
            data_dir,
        }
    }

    /// Shared rate limiter, also used by the search router.
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        self.rate.clone()
    }

    /// Broker behind this runner, for grant management.
    pub fn broker(&self) -> &PermissionBroker {
        &self.broker
    }

    /// Guard behind this runner.
    pub fn guard(&self) -> &PolicyGuard {
        &self.guard
    }

    /// Run logger behind this runner.
    pub fn run_logger(&self) -> &RunLogger {
        &self.runlog
    }

    /// Identity service behind this runner.
    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    /// Run one tool request through the guard chain and a worker process.
    pub async fn run(
        &self,
        request: &ToolRunRequest,
        mut limiter: Option<&mut RunLimiter>,
    ) -> Result<Value, CoreError> {
        let tool = request.tool.as_str();
        let session_id = request.session_id.as_str();
        let plugin = self
            .registry
            .get(tool)
            .ok_or_else(|| CoreError::Validation(format!("Unknown tool: {tool}")))?;

        let mode = self.guard.is_tool_allowed_in_mode(tool, request.mode);
        if !mode.allowed {
            self.audit.log_event(
                events::PERMISSION_DENIED,
                &format!("Denied tool {tool} in mode {}", request.mode),
                json!({"tool": tool, "reason": mode.reason}),
                Some(session_id),
            )?;
            return Err(CoreError::denied("mode", mode.reason));
        }

        let workspace = self.guard.is_tool_allowed_in_workspace(tool)?;
        if !workspace.allowed {
            self.audit.log_event(
                events::WORKSPACE_DENIED,
                &format!("Workspace denied tool {tool}"),
                json!({"tool": tool, "reason": workspace.reason}),
                Some(session_id),
            )?;
            return Err(CoreError::denied("workspace", workspace.reason));
        }

        let policy = self
            .guard
            .policy_allows_action(&format!("tool.{tool}"), false)?;
        if !policy.allowed {
            self.audit.log_event(
                events::POLICY_DENIED,
                &format!("Policy denied tool {tool}"),
                json!({"tool": tool, "reason": policy.reason}),
                Some(session_id),
            )?;
            return Err(CoreError::denied("policy", policy.reason));
        }

        for requirement in plugin.permission_requirements() {
            let path = if requirement.path_scoped {
                request.args.get("path").and_then(Value::as_str)
            } else {
                None
            };
            let decision = self.guard.assert_allowed(
                requirement.permission,
                session_id,
                path,
                request.safe_mode,
            )?;
            let denial_reason = if !decision.allowed {
                Some(decision.reason)
            } else if decision.reason == QUARANTINE_REQUIRED && !is_read_family(tool) {
                // The quarantine escape hatch exists for reads only; a
                // write outside workspace scopes stays denied.
                Some("Workspace scope denied: quarantine copies are read-only".to_string())
            } else {
                None
            };
            if let Some(reason) = denial_reason {
                self.audit.log_event(
                    events::PERMISSION_DENIED,
                    &format!(
                        "Denied {} for tool {tool}: {reason}",
                        requirement.permission
                    ),
                    json!({
                        "tool": tool,
                        "permission": requirement.permission.as_str(),
                        "reason": reason,
                    }),
                    Some(session_id),
                )?;
                return Err(CoreError::denied(requirement.permission.as_str(), reason));
            }
        }

        self.validate_path_args(tool, &request.args, session_id)?;

        let settings = self.identity.effective_settings()?;
        let mut args = request.args.clone();

        // Unconfirmed writes are forced into preview mode before the worker
        // ever sees them.
        if tool == "file_write"
            && settings.write_preview_default
            && !args
                .get("confirm")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            && let Value::Object(map) = &mut args
        {
            map.insert("preview_only".to_string(), Value::Bool(true));
        }

        if is_quarantine_candidate(tool) && settings.quarantine_mode {
            args = self.quarantine_out_of_scope_reads(tool, args, session_id)?;
        }

        if let Some(limiter) = limiter.as_deref_mut()
            && let Err(err) = self.enforce_limits(limiter, session_id)
        {
            if matches!(err, CoreError::Limit(_)) {
                self.audit.log_event(
                    events::LIMIT_BLOCKED,
                    &format!("Tool {tool} blocked by limits"),
                    json!({"tool": tool, "reason": err.to_string()}),
                    Some(session_id),
                )?;
            }
            return Err(err);
        }

        let workdir = self.data_dir.join(TOOL_RUNS_DIR).join(session_id);
        std::fs::create_dir_all(&workdir)?;

        debug!("dispatching tool to worker (tool={tool})");
        let worker_request = WorkerRequest {
            tool: tool.to_string(),
            args: args.clone(),
        };
        let outcome = self.launcher.launch(&worker_request, &workdir).await?;

        if outcome.status_code != Some(0) {
            let detail = if !outcome.stderr.trim().is_empty() {
                outcome.stderr
            } else if !outcome.stdout.trim().is_empty() {
                outcome.stdout
            } else {
                "Tool worker failed".to_string()
            };
            return Err(CoreError::WorkerFailure(detail));
        }

        let response: WorkerResponse = serde_json::from_str(&outcome.stdout)
            .map_err(|err| CoreError::WorkerFailure(format!("invalid worker response: {err}")))?;
        if !response.ok {
            return Err(CoreError::WorkerFailure(
                response
                    .error
                    .unwrap_or_else(|| "Tool worker failed".to_string()),
            ));
        }
        let result = response.result.unwrap_or(Value::Null);

        if let Some(limiter) = limiter.as_deref_mut()
            && let Err(err) = record_read_accounting(limiter, tool, &result)
        {
            if matches!(err, CoreError::Limit(_)) {
                self.audit.log_event(
                    events::LIMIT_BLOCKED,
                    &format!("Tool {tool} blocked by limits"),
                    json!({"tool": tool, "reason": err.to_string()}),
                    Some(session_id),
                )?;
            }
            return Err(err);
        }

        let result_hash = hash_text(&canonical_json(&result)?);
        let mut payload = json!({
            "tool": tool,
            "result_hash": result_hash,
            "stdout_truncated": outcome.stdout_truncated,
            "stderr_truncated": outcome.stderr_truncated,
        });
        if settings.verbose_logging {
            payload["args_sample"] = json!(sample(&args.to_string(), ARGS_SAMPLE_CHARS));
            payload["result_sample"] = json!(sample(&result.to_string(), RESULT_SAMPLE_CHARS));
        }
        info!("tool executed (tool={tool})");
        self.audit.log_event(
            events::TOOL_CALL,
            &format!("Tool {tool} executed"),
            payload.clone(),
            Some(session_id),
        )?;
        if let Some(run_id) = request.run_id {
            self.runlog
                .log_run_event(run_id, events::TOOL_CALL, &payload)?;
        }
        Ok(result)
    }

    /// Authoritative re-check of every path argument against the stored
    /// grant scopes, independent of the guard pass, to defeat argument
    /// tampering between the check and the call.
    fn validate_path_args(
        &self,
        tool: &str,
        args: &Value,
        session_id: &str,
    ) -> Result<(), CoreError> {
        let paths = path_args(args);
        if paths.is_empty() {
            return Ok(());
        }
        let grants = self.broker.list(session_id)?;

        let permission = if is_read_family(tool) {
            Permission::FilesystemRead
        } else if tool == "file_write" {
            Permission::FilesystemWrite
        } else {
            return Ok(());
        };
        let scopes = grant_scopes(&grants, permission, session_id);
        for path in &paths {
            let contained = path_within_scopes(path, &scopes);
            if !contained.allowed {
                self.audit.log_event(
                    events::PERMISSION_DENIED,
                    &format!("Denied {permission} for tool {tool}: {}", contained.reason),
                    json!({
                        "tool": tool,
                        "permission": permission.as_str(),
                        "reason": contained.reason,
                    }),
                    Some(session_id),
                )?;
                return Err(CoreError::denied(permission.as_str(), contained.reason));
            }
        }
        Ok(())
    }

    /// Copy out-of-workspace read targets into the per-session quarantine
    /// area and rewrite the args to the quarantined paths.
    fn quarantine_out_of_scope_reads(
        &self,
        tool: &str,
        mut args: Value,
        session_id: &str,
    ) -> Result<Value, CoreError> {
        let identity = self.identity.snapshot()?;
        let scopes = identity.workspace_scopes();
        if scopes.is_empty() {
            return Ok(args);
        }
        let paths = path_args(&args);
        let any_outside = paths
            .iter()
            .any(|path| !path_within_scopes(path, scopes).allowed);
        if !any_outside {
            return Ok(args);
        }

        info!("quarantining out-of-workspace reads (tool={tool})");
        let quarantined = self.apply_quarantine(&paths, session_id)?;
        if let Value::Object(map) = &mut args {
            if tool == "file_read" {
                if let Some(first) = quarantined.first() {
                    map.insert("path".to_string(), Value::String(first.clone()));
                }
            } else {
                map.insert(
                    "paths".to_string(),
                    Value::Array(quarantined.into_iter().map(Value::String).collect()),
                );
            }
        }
        Ok(args)
    }

    fn apply_quarantine(
        &self,
        paths: &[String],
        session_id: &str,
    ) -> Result<Vec<String>, CoreError> {
        let session_dir = self.data_dir.join(QUARANTINE_DIR).join(session_id);
        std::fs::create_dir_all(&session_dir)?;
        let mut resolved = Vec::with_capacity(paths.len());
        for item in paths {
            let source = PathBuf::from(item);
            let Some(name) = source.file_name() else {
                resolved.push(item.clone());
                continue;
            };
            let dest = session_dir.join(name);
            match std::fs::read_to_string(&source)
                .and_then(|content| std::fs::write(&dest, content))
            {
                Ok(()) => resolved.push(dest.display().to_string()),
                // Unreadable sources keep their original path; the worker
                // will surface the read failure itself.
                Err(_) => resolved.push(item.clone()),
            }
        }
        Ok(resolved)
    }

    fn enforce_limits(&self, limiter: &mut RunLimiter, session_id: &str) -> Result<(), CoreError> {
        limiter.check_runtime()?;
        limiter.check_tool_call()?;
        self.rate
            .enforce(session_id, limiter.max_tool_calls_per_minute())?;
        limiter.record_tool_call();
        Ok(())
    }
}

fn path_args(args: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    if let Some(path) = args.get("path").and_then(Value::as_str) {
        paths.push(path.to_string());
    }
    if let Some(list) = args.get("paths").and_then(Value::as_array) {
        paths.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
    }
    paths
}

/// Scopes of the best-matching grant: the session-bound row wins over the
/// `always` row, mirroring broker selection.
fn grant_scopes(grants: &[Grant], permission: Permission, session_id: &str) -> Vec<String> {
    let mut best: Option<&Grant> = None;
    for grant in grants.iter().filter(|grant| grant.permission == permission) {
        if grant.session_id.as_deref() == Some(session_id) {
            best = Some(grant);
            break;
        }
        if best.is_none() {
            best = Some(grant);
        }
    }
    best.map(|grant| grant.allowed_paths.clone())
        .unwrap_or_default()
}

fn record_read_accounting(
    limiter: &mut RunLimiter,
    tool: &str,
    result: &Value,
) -> Result<(), CoreError> {
    if tool == "file_read" {
        let bytes = result
            .get("content")
            .and_then(Value::as_str)
            .map(|content| content.len() as u64)
            .unwrap_or(0);
        return limiter.record_file_reads(1, bytes);
    }
    if tool == "file_read_batch" {
        let files = result
            .get("files")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let bytes: u64 = files
            .iter()
            .filter_map(|item| item.get("content").and_then(Value::as_str))
            .map(|content| content.len() as u64)
            .sum();
        return limiter.record_file_reads(files.len() as u64, bytes);
    }
    Ok(())
}

fn sample(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
