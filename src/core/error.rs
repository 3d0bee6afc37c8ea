//! RB-008: Error taxonomy for parsing, substitution, resolution and builds.

use super::format::{FormatVersion, InstructionKind};
use std::path::PathBuf;
use thiserror::Error;

/// What kind of rule a [`ParseError`] violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Malformed text: unexpected token, bad indent, trailing garbage.
    Syntax,
    /// A known instruction used below its minimum format version.
    VersionGate {
        instruction: InstructionKind,
        minimum: FormatVersion,
    },
    /// An instruction the caller refused (e.g. `run` in safe mode).
    Forbidden { instruction: InstructionKind },
    /// A branch name used twice in one recipe.
    DuplicateName { name: String },
    /// Two siblings nested at the same target directory.
    DuplicateTarget { path: String },
    /// Header present, but no base branch.
    Empty,
}

/// A recipe that could not be parsed. Always fatal; no partial plan exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error parsing {filename}:{line}:{char}: {problem}.")]
pub struct ParseError {
    pub filename: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based character column.
    pub char: usize,
    pub problem: String,
    pub kind: ParseErrorKind,
}

/// A `deb-version` template that could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstitutionError {
    #[error(
        "deb-version not fully expanded: {template}. Valid substitutions in recipe format {format} are: {}",
        available.join(", ")
    )]
    NotFullyExpanded {
        template: String,
        format: FormatVersion,
        available: Vec<String>,
    },

    #[error("cannot substitute revno of branch '{name}': no branch with that name in the recipe")]
    UnknownBranch { name: String },

    #[error("cannot substitute revno of branch {branch} in deb-version, as its revno can't be determined")]
    RevnoUnavailable { branch: String },

    #[error("cannot substitute {token}: {reason}")]
    Unavailable { token: String, reason: String },

    #[error("invalid deb-version: {version}")]
    InvalidVersion { version: String },
}

/// A failure reported by a VCS provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct VcsError {
    pub message: String,
}

impl VcsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Any failure of the parse → resolve → build pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Substitution(#[from] SubstitutionError),

    #[error("cannot resolve {branch} ({location}): {source}")]
    Resolution {
        branch: String,
        location: String,
        #[source]
        source: VcsError,
    },

    #[error("{operation} of {branch} failed: {source}")]
    Vcs {
        branch: String,
        operation: &'static str,
        #[source]
        source: VcsError,
    },

    #[error("conflicts in {} while building {branch}: {}", target.display(), conflicts.join(", "))]
    Conflict {
        branch: String,
        target: PathBuf,
        conflicts: Vec<String>,
    },

    #[error("command `{command}` exited with status {exit_code}: {output}")]
    Command {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("{branch} has not been resolved to a revision")]
    Unresolved { branch: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
