//! End-to-end tests for the tool runner pipeline with scripted workers.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::TempDir;
use warden_core::{
    CoreError, GrantRequest, RunLimiter, ToolRunRequest, ToolRunner, canonical_json, hash_text,
};
use warden_protocol::{GrantScope, Permission, RunMode};
use warden_sandbox::WorkerLauncher;
use warden_store::{NewWorkspace, Store};
use warden_tools::builtin_registry;

const SESSION: &str = "test-session";

/// Launcher that ignores the request and prints a fixed success response.
fn static_worker(result: &Value) -> WorkerLauncher {
    let response = json!({"ok": true, "result": result});
    WorkerLauncher::new(
        "sh",
        vec![
            "-c".to_string(),
            format!("cat > /dev/null; printf '%s' '{response}'"),
        ],
    )
}

/// Launcher that echoes the worker request back as the tool result, so
/// tests can observe the args the worker actually received.
fn echo_worker() -> WorkerLauncher {
    WorkerLauncher::new(
        "sh",
        vec![
            "-c".to_string(),
            "REQ=$(cat); printf '{\"ok\":true,\"result\":%s}' \"$REQ\"".to_string(),
        ],
    )
}

fn runner_with(store: &Store, launcher: WorkerLauncher, data_dir: &TempDir) -> ToolRunner {
    ToolRunner::new(
        store.clone(),
        builtin_registry(),
        launcher,
        data_dir.path().to_path_buf(),
    )
}

fn grant_read(runner: &ToolRunner, scopes: Vec<String>) {
    runner
        .broker()
        .grant(
            &GrantRequest {
                permission: Permission::FilesystemRead,
                scope: GrantScope::Session,
                allowed_paths: scopes,
            },
            SESSION,
        )
        .expect("grant");
}

fn read_request(path: &str) -> ToolRunRequest {
    ToolRunRequest {
        tool: "file_read".to_string(),
        args: json!({"path": path}),
        session_id: SESSION.to_string(),
        safe_mode: true,
        mode: RunMode::Chat,
        run_id: None,
    }
}

fn audit_types(store: &Store) -> Vec<String> {
    store
        .list_audit(50)
        .expect("audit")
        .into_iter()
        .map(|record| record.event_type)
        .collect()
}

#[tokio::test]
async fn unknown_tool_is_a_validation_error() {
    let data_dir = TempDir::new().expect("tempdir");
    let store = Store::open_in_memory().expect("store");
    let runner = runner_with(&store, static_worker(&json!({})), &data_dir);

    let err = runner
        .run(
            &ToolRunRequest {
                tool: "teleport".to_string(),
                args: json!({}),
                session_id: SESSION.to_string(),
                safe_mode: true,
                mode: RunMode::Chat,
                run_id: None,
            },
            None,
        )
        .await
        .expect_err("unknown tool");
    assert_eq!(matches!(err, CoreError::Validation(_)), true);
}

#[tokio::test]
async fn chat_mode_blocks_write_tools() {
    let data_dir = TempDir::new().expect("tempdir");
    let store = Store::open_in_memory().expect("store");
    let runner = runner_with(&store, static_worker(&json!({})), &data_dir);

    let err = runner
        .run(
            &ToolRunRequest {
                tool: "file_write".to_string(),
                args: json!({"path": "/tmp/x", "content": "y"}),
                session_id: SESSION.to_string(),
                safe_mode: true,
                mode: RunMode::Chat,
                run_id: None,
            },
            None,
        )
        .await
        .expect_err("mode denial");
    assert_eq!(err.to_string().starts_with("permission_required:mode:"), true);
    assert_eq!(audit_types(&store).contains(&"permission.denied".to_string()), true);
}

#[tokio::test]
async fn missing_grant_denies_before_any_worker_runs() {
    let data_dir = TempDir::new().expect("tempdir");
    let store = Store::open_in_memory().expect("store");
    let runner = runner_with(&store, static_worker(&json!({})), &data_dir);

    let err = runner
        .run(&read_request("/tmp/anything.txt"), None)
        .await
        .expect_err("no grant");
    assert_eq!(
        err.to_string(),
        "permission_required:filesystem.read:No grant found"
    );
    let types = audit_types(&store);
    assert_eq!(types.contains(&"permission.denied".to_string()), true);
    assert_eq!(types.contains(&"tool.call".to_string()), false);
}

#[tokio::test]
async fn successful_run_writes_one_hashed_tool_call_entry() {
    let data_dir = TempDir::new().expect("tempdir");
    let files = TempDir::new().expect("tempdir");
    let target = files.path().join("note.txt");
    std::fs::write(&target, "hello").expect("write");

    let store = Store::open_in_memory().expect("store");
    let result = json!({"content": "hello", "path": target.display().to_string()});
    let runner = runner_with(&store, static_worker(&result), &data_dir);
    grant_read(&runner, vec![files.path().display().to_string()]);

    let returned = runner
        .run(&read_request(&target.display().to_string()), None)
        .await
        .expect("run");
    assert_eq!(returned, result);

    let records = store.list_audit(50).expect("audit");
    let tool_calls: Vec<_> = records
        .iter()
        .filter(|record| record.event_type == "tool.call")
        .collect();
    assert_eq!(tool_calls.len(), 1);
    let expected_hash = hash_text(&canonical_json(&result).expect("canonical"));
    assert_eq!(tool_calls[0].payload["result_hash"], json!(expected_hash));
    assert_eq!(tool_calls[0].payload["tool"], json!("file_read"));
}

#[tokio::test]
async fn worker_timeout_surfaces_and_leaves_no_tool_call() {
    let data_dir = TempDir::new().expect("tempdir");
    let files = TempDir::new().expect("tempdir");
    let target = files.path().join("slow.txt");
    std::fs::write(&target, "x").expect("write");

    let store = Store::open_in_memory().expect("store");
    let launcher = WorkerLauncher::new("sh", vec!["-c".to_string(), "sleep 5".to_string()])
        .with_timeout(Duration::from_millis(100));
    let runner = runner_with(&store, launcher, &data_dir);
    grant_read(&runner, vec![files.path().display().to_string()]);

    let err = runner
        .run(&read_request(&target.display().to_string()), None)
        .await
        .expect_err("timeout");
    match &err {
        CoreError::WorkerFailure(message) => {
            assert_eq!(message.contains("timed out"), true);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(audit_types(&store).contains(&"tool.call".to_string()), false);
}

#[tokio::test]
async fn worker_reported_failure_becomes_worker_failure() {
    let data_dir = TempDir::new().expect("tempdir");
    let files = TempDir::new().expect("tempdir");
    let target = files.path().join("bad.txt");
    std::fs::write(&target, "x").expect("write");

    let store = Store::open_in_memory().expect("store");
    let launcher = WorkerLauncher::new(
        "sh",
        vec![
            "-c".to_string(),
            "cat > /dev/null; printf '{\"ok\":false,\"error\":\"boom\",\"trace\":\"t\"}'; exit 1"
                .to_string(),
        ],
    );
    let runner = runner_with(&store, launcher, &data_dir);
    grant_read(&runner, vec![files.path().display().to_string()]);

    let err = runner
        .run(&read_request(&target.display().to_string()), None)
        .await
        .expect_err("worker failure");
    assert_eq!(matches!(err, CoreError::WorkerFailure(_)), true);
}

#[tokio::test]
async fn limiter_blocks_second_call_and_audits_it() {
    let data_dir = TempDir::new().expect("tempdir");
    let files = TempDir::new().expect("tempdir");
    let target = files.path().join("note.txt");
    std::fs::write(&target, "hello").expect("write");

    let store = Store::open_in_memory().expect("store");
    let runner = runner_with(&store, static_worker(&json!({"content": "hi"})), &data_dir);
    grant_read(&runner, vec![files.path().display().to_string()]);

    let limits: BTreeMap<String, u64> = [
        ("max_tool_calls_per_message".to_string(), 1u64),
        ("max_tool_calls_per_minute".to_string(), 100u64),
    ]
    .into_iter()
    .collect();
    let mut limiter = RunLimiter::new(&limits, SESSION);

    runner
        .run(&read_request(&target.display().to_string()), Some(&mut limiter))
        .await
        .expect("first call");
    let err = runner
        .run(&read_request(&target.display().to_string()), Some(&mut limiter))
        .await
        .expect_err("second call");
    assert_eq!(matches!(err, CoreError::Limit(_)), true);

    let records = store.list_audit(50).expect("audit");
    let tool_calls = records
        .iter()
        .filter(|record| record.event_type == "tool.call")
        .count();
    let blocked = records
        .iter()
        .filter(|record| record.event_type == "limit.blocked")
        .count();
    assert_eq!(tool_calls, 1);
    assert_eq!(blocked, 1);
}

#[tokio::test]
async fn policy_deny_blocks_tool_and_audits_it() {
    let data_dir = TempDir::new().expect("tempdir");
    let store = Store::open_in_memory().expect("store");
    let profile = store
        .insert_profile(
            "Locked",
            &[(
                "policy_rules".to_string(),
                json!("deny(tool.file_read) always"),
            )]
            .into_iter()
            .collect(),
        )
        .expect("profile");
    store.activate_profile(profile.id).expect("activate");

    let runner = runner_with(&store, static_worker(&json!({})), &data_dir);
    let err = runner
        .run(&read_request("/tmp/x.txt"), None)
        .await
        .expect_err("policy denial");
    assert_eq!(err.to_string().starts_with("permission_required:policy:"), true);
    assert_eq!(audit_types(&store).contains(&"policy.denied".to_string()), true);
}

#[tokio::test]
async fn unconfirmed_writes_are_forced_into_preview() {
    let data_dir = TempDir::new().expect("tempdir");
    let files = TempDir::new().expect("tempdir");
    let target = files.path().join("doc.txt");

    let store = Store::open_in_memory().expect("store");
    let runner = runner_with(&store, echo_worker(), &data_dir);
    runner
        .broker()
        .grant(
            &GrantRequest {
                permission: Permission::FilesystemWrite,
                scope: GrantScope::Session,
                allowed_paths: vec![files.path().display().to_string()],
            },
            SESSION,
        )
        .expect("grant");

    let echoed = runner
        .run(
            &ToolRunRequest {
                tool: "file_write".to_string(),
                args: json!({"path": target.display().to_string(), "content": "data"}),
                session_id: SESSION.to_string(),
                safe_mode: true,
                mode: RunMode::Workflow,
                run_id: None,
            },
            None,
        )
        .await
        .expect("run");
    assert_eq!(echoed["args"]["preview_only"], json!(true));
}

#[tokio::test]
async fn out_of_workspace_reads_are_rewritten_to_quarantine_copies() {
    let data_dir = TempDir::new().expect("tempdir");
    let files = TempDir::new().expect("tempdir");
    let project = files.path().join("project");
    std::fs::create_dir(&project).expect("mkdir");
    let outside = files.path().join("outside.txt");
    std::fs::write(&outside, "contraband").expect("write");

    let store = Store::open_in_memory().expect("store");
    let workspace = store
        .insert_workspace(&NewWorkspace {
            name: "Project".to_string(),
            scopes: vec![project.display().to_string()],
            ..Default::default()
        })
        .expect("workspace");
    store.activate_workspace(workspace.id).expect("activate");

    let runner = runner_with(&store, echo_worker(), &data_dir);
    grant_read(&runner, vec![files.path().display().to_string()]);

    let echoed = runner
        .run(&read_request(&outside.display().to_string()), None)
        .await
        .expect("run");
    let rewritten = echoed["args"]["path"].as_str().expect("path");
    let quarantine_root = data_dir.path().join("quarantine").join(SESSION);
    assert_eq!(rewritten.starts_with(&quarantine_root.display().to_string()), true);
    assert_eq!(
        std::fs::read_to_string(rewritten).expect("quarantine copy"),
        "contraband"
    );
}

#[tokio::test]
async fn tool_call_events_mirror_into_open_runs() {
    let data_dir = TempDir::new().expect("tempdir");
    let files = TempDir::new().expect("tempdir");
    let target = files.path().join("note.txt");
    std::fs::write(&target, "hello").expect("write");

    let store = Store::open_in_memory().expect("store");
    let runner = runner_with(&store, static_worker(&json!({"content": "hi"})), &data_dir);
    grant_read(&runner, vec![files.path().display().to_string()]);

    let run = runner
        .run_logger()
        .start_run(SESSION, RunMode::Chat, "read my note", None, None)
        .expect("start run");
    let mut request = read_request(&target.display().to_string());
    request.run_id = Some(run.id);
    runner.run(&request, None).await.expect("run");
    runner.run_logger().finish_run(&run).expect("finish");

    let record = runner.run_logger().get_run(run.id).expect("fetch");
    assert_eq!(record.events.len(), 1);
    assert_eq!(record.events[0].event_type, "tool.call");
    assert_eq!(record.events[0].payload["tool"], json!("file_read"));
}
