//! Shell command execution with timeout enforcement
//!
//! Shared by the `run_command` tool, the git tools, and backpressure checks.
//! A command that outlives its deadline is killed and whatever output was
//! read up to that point is returned.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use super::ToolError;

/// Command fragments that are refused outright. Best-effort, not a whitelist.
pub const DENYLIST: &[&str] = &["rm -rf /", "mkfs", "> /dev/", "dd if="];

/// Returns the denylist fragment a command matches, if any
pub fn denied_fragment(command: &str) -> Option<&'static str> {
    DENYLIST.iter().copied().find(|fragment| command.contains(fragment))
}

/// Captured result of a shell command
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Run a command through `sh -c` in the given directory.
///
/// The subprocess inherits the environment. On timeout the child is killed,
/// `exit_code` is -1, and partial output is kept.
pub async fn run_shell(command: &str, cwd: &Path, timeout: Duration) -> Result<ShellOutput, ToolError> {
    debug!(%command, ?cwd, "spawning shell command");
    let start = Instant::now();

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Readers run independently so partial output survives a kill
    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => (status.code().unwrap_or(-1), false),
        Ok(Err(e)) => {
            debug!(error = %e, "failed to wait on child");
            (-1, false)
        }
        Err(_) => {
            debug!(%command, "command exceeded timeout, killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
            (-1, true)
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(ShellOutput {
        stdout,
        stderr,
        exit_code,
        timed_out,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}
