//! Full pipeline test: guard chain, real worker subprocess, audit trail.

use pretty_assertions::assert_eq;
use serde_json::json;
use warden_core::{GrantRequest, ToolRunRequest, ToolRunner, canonical_json, hash_text};
use warden_protocol::{GrantScope, Permission, RunMode};
use warden_sandbox::WorkerLauncher;
use warden_store::Store;
use warden_tools::builtin_registry;

const SESSION: &str = "e2e-session";

fn real_worker() -> WorkerLauncher {
    WorkerLauncher::new(env!("CARGO_BIN_EXE_warden"), vec!["tool-worker".to_string()])
}

#[tokio::test]
async fn grant_then_read_produces_result_and_hashed_audit_entry() {
    let data_dir = tempfile::tempdir().expect("data dir");
    let files = tempfile::tempdir().expect("files");
    let target = files.path().join("report.md");
    std::fs::write(&target, "# quarterly report\n").expect("write");

    let store = Store::open_in_memory().expect("store");
    let runner = ToolRunner::new(
        store.clone(),
        builtin_registry(),
        real_worker(),
        data_dir.path().to_path_buf(),
    );
    runner
        .broker()
        .grant(
            &GrantRequest {
                permission: Permission::FilesystemRead,
                scope: GrantScope::Session,
                allowed_paths: vec![files.path().display().to_string()],
            },
            SESSION,
        )
        .expect("grant");

    let result = runner
        .run(
            &ToolRunRequest {
                tool: "file_read".to_string(),
                args: json!({"path": target.display().to_string()}),
                session_id: SESSION.to_string(),
                safe_mode: true,
                mode: RunMode::Chat,
                run_id: None,
            },
            None,
        )
        .await
        .expect("run");
    assert_eq!(result["content"], json!("# quarterly report\n"));

    let records = store.list_audit(20).expect("audit");
    let tool_call = records
        .iter()
        .find(|record| record.event_type == "tool.call")
        .expect("tool.call entry");
    let expected = hash_text(&canonical_json(&result).expect("canonical"));
    assert_eq!(tool_call.payload["result_hash"], json!(expected));
}

#[tokio::test]
async fn once_grant_admits_exactly_one_read() {
    let data_dir = tempfile::tempdir().expect("data dir");
    let files = tempfile::tempdir().expect("files");
    let target = files.path().join("once.txt");
    std::fs::write(&target, "single use").expect("write");

    let store = Store::open_in_memory().expect("store");
    let runner = ToolRunner::new(
        store,
        builtin_registry(),
        real_worker(),
        data_dir.path().to_path_buf(),
    );
    runner
        .broker()
        .grant(
            &GrantRequest {
                permission: Permission::FilesystemRead,
                scope: GrantScope::Once,
                allowed_paths: vec![files.path().display().to_string()],
            },
            SESSION,
        )
        .expect("grant");

    let request = ToolRunRequest {
        tool: "file_read".to_string(),
        args: json!({"path": target.display().to_string()}),
        session_id: SESSION.to_string(),
        safe_mode: true,
        mode: RunMode::Chat,
        run_id: None,
    };
    runner.run(&request, None).await.expect("first read");

    let err = runner.run(&request, None).await.expect_err("second read");
    assert_eq!(
        err.to_string(),
        "permission_required:filesystem.read:No grant found"
    );
}

#[tokio::test]
async fn workflow_write_executes_with_confirmation() {
    let data_dir = tempfile::tempdir().expect("data dir");
    let files = tempfile::tempdir().expect("files");
    let target = files.path().join("out.txt");

    let store = Store::open_in_memory().expect("store");
    let runner = ToolRunner::new(
        store,
        builtin_registry(),
        real_worker(),
        data_dir.path().to_path_buf(),
    );
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

    let result = runner
        .run(
            &ToolRunRequest {
                tool: "file_write".to_string(),
                args: json!({
                    "path": target.display().to_string(),
                    "content": "final text",
                    "confirm": true,
                }),
                session_id: SESSION.to_string(),
                safe_mode: true,
                mode: RunMode::Workflow,
                run_id: None,
            },
            None,
        )
        .await
        .expect("run");
    assert_eq!(result["written_chars"], json!(10));
    assert_eq!(std::fs::read_to_string(&target).expect("read"), "final text");
}
