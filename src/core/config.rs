//! RB-016: Build options — loaded from TOML, validated before a build.

use super::error::BuildError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options for one build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildOptions {
    /// Forbid `run` instructions.
    #[serde(default)]
    pub safe: bool,

    /// Manifest file name, written inside the built tree.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Extra manifest copy written outside the tree.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// Manifest of the previous build. A missing file means first build.
    #[serde(default)]
    pub if_changed_from: Option<PathBuf>,

    /// Build into a staging directory and publish the tree here.
    #[serde(default)]
    pub publish_to: Option<PathBuf>,
}

fn default_manifest_name() -> String {
    "builder.manifest".to_string()
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            safe: false,
            manifest_name: default_manifest_name(),
            manifest_path: None,
            if_changed_from: None,
            publish_to: None,
        }
    }
}

impl BuildOptions {
    /// Where the in-tree manifest goes for a tree at `tree`.
    pub fn manifest_in(&self, tree: &Path) -> PathBuf {
        tree.join(&self.manifest_name)
    }
}

/// A problem found by [`validate_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

/// Load options from a TOML file.
pub fn load_options(path: &Path) -> Result<BuildOptions, BuildError> {
    let content = std::fs::read_to_string(path).map_err(|e| BuildError::Config {
        path: path.to_path_buf(),
        message: format!("cannot read: {}", e),
    })?;
    parse_options(&content).map_err(|message| BuildError::Config {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse options from TOML text.
pub fn parse_options(text: &str) -> Result<BuildOptions, String> {
    toml::from_str(text).map_err(|e| format!("TOML parse error: {}", e))
}

/// Validate parsed options. Returns a list of errors (empty = valid).
pub fn validate_options(options: &BuildOptions) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if options.manifest_name.is_empty() {
        errors.push(ValidationError {
            message: "manifest_name must not be empty".to_string(),
        });
    } else if options.manifest_name.contains('/') {
        errors.push(ValidationError {
            message: format!(
                "manifest_name must be a plain file name, got \"{}\"",
                options.manifest_name
            ),
        });
    }

    if let Some(publish) = &options.publish_to {
        if publish.file_name().is_none() {
            errors.push(ValidationError {
                message: format!("publish_to has no directory name: {}", publish.display()),
            });
        }
        if options.if_changed_from.as_deref() == Some(publish.as_path()) {
            errors.push(ValidationError {
                message: "if_changed_from must not be the publish directory".to_string(),
            });
        }
    }

    errors
}
