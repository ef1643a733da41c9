//! Worker process launch and supervision.

use crate::{
    DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_TIMEOUT_SECONDS, SandboxError, scrubbed_env,
    truncate_output,
};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use warden_protocol::WorkerRequest;

/// Captured result of one worker run.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    /// Exit status code if available.
    pub status_code: Option<i32>,
    /// Captured stdout, truncated at the output ceiling.
    pub stdout: String,
    /// Captured stderr, truncated at the output ceiling.
    pub stderr: String,
    /// Whether stdout was cut.
    pub stdout_truncated: bool,
    /// Whether stderr was cut.
    pub stderr_truncated: bool,
}

/// Launches tool worker subprocesses with a scrubbed environment, piped
/// stdio, a wall timeout, and per-stream output ceilings.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    output_limit: usize,
}

impl WorkerLauncher {
    /// Launcher for an explicit program and argument list.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            output_limit: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    /// Launcher that re-invokes the current executable with the worker
    /// entry argument.
    pub fn current_exe(worker_arg: &str) -> Result<Self, SandboxError> {
        let program = std::env::current_exe()?;
        Ok(Self::new(program, vec![worker_arg.to_string()]))
    }

    /// Override the wall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the per-stream output ceiling.
    pub fn with_output_limit(mut self, output_limit: usize) -> Self {
        self.output_limit = output_limit;
        self
    }

    /// Program path the launcher will execute.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run one request through a fresh worker process.
    ///
    /// The child receives the serialized request on stdin and must print a
    /// single response object on stdout. A run past the wall timeout is
    /// killed and surfaces as [`SandboxError::Timeout`].
    pub async fn launch(
        &self,
        request: &WorkerRequest,
        cwd: &Path,
    ) -> Result<WorkerOutcome, SandboxError> {
        debug!(
            "launching worker (tool={}, cwd={})",
            request.tool,
            cwd.display()
        );
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.env_clear();
        for (key, value) in scrubbed_env() {
            command.env(key, value);
        }
        command.current_dir(cwd);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        let mut child = command.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(request)?;
            // A worker that exits before reading produces a broken pipe; the
            // exit status below is the authoritative failure signal.
            if let Err(err) = stdin.write_all(&payload).await {
                warn!("worker stdin write failed: {err}");
            }
        }

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("worker timed out (tool={})", request.tool);
                return Err(SandboxError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let (stdout, stdout_truncated) =
            truncate_output(&String::from_utf8_lossy(&output.stdout), self.output_limit);
        let (stderr, stderr_truncated) =
            truncate_output(&String::from_utf8_lossy(&output.stderr), self.output_limit);
        Ok(WorkerOutcome {
            status_code: output.status.code(),
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
        })
    }
}
