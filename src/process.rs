//! Bounded execution of external commands.
//!
//! Commands are always spawned from an explicit argument vector. Nothing is
//! handed to a shell, so values taken from configuration (hostnames, paths)
//! can never change the structure of a command.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Captured output of one external command.
///
/// A non-empty `stderr` means the tool reported a problem, failed to launch,
/// or timed out. `stdout` holds whatever the tool printed on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
        }
    }

    /// Returns true when the command reported any error text.
    pub fn has_error(&self) -> bool {
        !self.stderr.is_empty()
    }
}

/// Runs `command_args` (executable first) and captures its output.
///
/// When `timeout` is set and non-zero the call returns after at most that
/// long, with `"Timed out after <N> seconds"` in `stderr`. The child is killed
/// when its handle is dropped and reaped in the background by the runtime.
/// Launch failures are reported in `stderr` rather than returned as errors.
pub async fn run<S: AsRef<OsStr>>(
    command_args: &[S],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> ProcessOutput {
    let Some((program, args)) = command_args.split_first() else {
        return ProcessOutput::failed("empty command");
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ProcessOutput::failed(format!(
                "failed to launch {}: {}",
                program.as_ref().to_string_lossy(),
                e
            ))
        }
    };
    let pid = child.id();

    let output = match timeout.filter(|t| !t.is_zero()) {
        None => child.wait_with_output().await,
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_) => {
                // Dropping the wait future drops the child, which kills it.
                tracing::debug!("Abandoned process {:?} after {:?}", pid, limit);
                return ProcessOutput::failed(format!(
                    "Timed out after {} seconds",
                    limit.as_secs_f64()
                ));
            }
        },
    };

    match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if !output.status.success() && stderr.trim().is_empty() {
                stderr = format!("exited with {}", output.status);
            }
            ProcessOutput { stdout, stderr }
        }
        Err(e) => ProcessOutput::failed(format!("failed to wait for process: {}", e)),
    }
}

/// Something that can execute an external command.
///
/// The provisioner only talks to this trait, which lets callers substitute a
/// runner that records or fakes invocations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command_args: &[OsString],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> ProcessOutput;
}

/// Runs commands as real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        command_args: &[OsString],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> ProcessOutput {
        run(command_args, working_dir, timeout).await
    }
}
