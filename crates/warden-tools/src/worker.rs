//! Worker entry loop: one request on stdin, one response on stdout.
//!
//! The worker has no network, no database handle, and no knowledge of
//! grants. It can only perform the narrow operation its tool name implies;
//! the parent decides whether it is ever invoked.

use crate::registry::ToolRegistry;
use std::io::{Read, Write};
use warden_protocol::{WorkerRequest, WorkerResponse};

/// Run one worker request from stdin and write the response to stdout.
///
/// Returns the process exit code: 0 only when the tool ran successfully.
pub fn run_worker(registry: &ToolRegistry) -> i32 {
    let mut input = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut input) {
        return respond_failure(format!("failed to read request: {err}"), String::new());
    }
    let request: WorkerRequest = match serde_json::from_str(&input) {
        Ok(request) => request,
        Err(err) => {
            return respond_failure(format!("invalid request: {err}"), String::new());
        }
    };

    let Some(plugin) = registry.get(&request.tool) else {
        return respond_failure(
            format!("Unknown tool: {}", request.tool),
            String::new(),
        );
    };

    match plugin.run(&request.args) {
        Ok(result) => {
            write_response(&WorkerResponse::success(result));
            0
        }
        Err(err) => respond_failure(
            err.to_string(),
            format!("tool {} failed in worker", request.tool),
        ),
    }
}

fn respond_failure(error: String, trace: String) -> i32 {
    write_response(&WorkerResponse::failure(error, trace));
    1
}

fn write_response(response: &WorkerResponse) {
    if let Ok(encoded) = serde_json::to_string(response) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(encoded.as_bytes());
        let _ = stdout.flush();
    }
}
