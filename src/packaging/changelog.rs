//! RB-013: Previous package version from `debian/changelog`.

use super::version::DebVersion;
use super::PackagingMetadata;
use crate::core::error::BuildError;
use std::path::Path;

/// Reads the version of the newest stanza in `<tree>/debian/changelog`.
#[derive(Debug, Clone, Default)]
pub struct ChangelogMetadata;

impl PackagingMetadata for ChangelogMetadata {
    fn previous_version(&self, tree: &Path) -> Result<Option<DebVersion>, BuildError> {
        let path = tree.join("debian").join("changelog");
        if !path.exists() {
            tracing::warn!(path = %path.display(), "debian/changelog was not present");
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
        if contents.trim().is_empty() {
            tracing::warn!(path = %path.display(), "debian/changelog was empty");
            return Ok(None);
        }
        let version = newest_version(&contents);
        if version.is_none() {
            tracing::warn!(path = %path.display(), "debian/changelog didn't contain any parseable stanzas");
        }
        Ok(version)
    }
}

/// Version from the first stanza header: `package (version) dists; urgency=x`.
pub fn newest_version(contents: &str) -> Option<DebVersion> {
    let header = contents.lines().find(|line| !line.trim().is_empty())?;
    if header.starts_with(char::is_whitespace) {
        return None;
    }
    let (package, rest) = header.split_once(" (")?;
    if package.is_empty() || package.contains(char::is_whitespace) {
        return None;
    }
    let (version, _) = rest.split_once(')')?;
    DebVersion::parse(version)
}
