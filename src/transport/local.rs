//! RB-010: Local command execution via `sh -c`.

use super::{CommandRunner, ExecOutput};
use crate::core::error::BuildError;
use std::path::Path;
use std::process::{Command, Stdio};

/// Runs commands on this machine with `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

impl CommandRunner for LocalRunner {
    fn run(&self, command: &str, cwd: &Path) -> Result<ExecOutput, BuildError> {
        exec_local(command, cwd)
    }
}

/// Execute `command` in `cwd`, capturing stdout and stderr.
pub fn exec_local(command: &str, cwd: &Path) -> Result<ExecOutput, BuildError> {
    tracing::debug!(command, cwd = %cwd.display(), "exec");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| BuildError::io(cwd, e))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(ExecOutput {
        // Killed by a signal: no exit code.
        exit_code: output.status.code().unwrap_or(-1),
        output: combined,
    })
}
