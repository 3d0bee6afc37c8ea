//! RB-010: Command runner — executes `run` steps of a recipe.

pub mod local;

pub use local::LocalRunner;

use crate::core::error::BuildError;
use std::path::Path;

/// Result of one command execution.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    /// stdout followed by stderr.
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes a shell command in a working directory.
///
/// An `Err` means the command could not be started at all; a command
/// that ran and failed is an `Ok` with a non-zero exit code.
pub trait CommandRunner {
    fn run(&self, command: &str, cwd: &Path) -> Result<ExecOutput, BuildError>;
}

/// Test double: records every command and answers with scripted exit codes.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingRunner {
    failures: std::collections::HashMap<String, i32>,
    calls: std::cell::RefCell<Vec<(String, std::path::PathBuf)>>,
}

#[cfg(test)]
impl RecordingRunner {
    pub(crate) fn failing(mut self, command: &str, exit_code: i32) -> Self {
        self.failures.insert(command.to_string(), exit_code);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, std::path::PathBuf)> {
        self.calls.borrow().clone()
    }
}

#[cfg(test)]
impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str, cwd: &Path) -> Result<ExecOutput, BuildError> {
        self.calls
            .borrow_mut()
            .push((command.to_string(), cwd.to_path_buf()));
        let exit_code = self.failures.get(command).copied().unwrap_or(0);
        Ok(ExecOutput {
            exit_code,
            output: format!("ran {}", command),
        })
    }
}
