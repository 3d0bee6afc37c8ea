//! RB-017: Staged builds — build into a content-addressed sibling
//! directory, then swap it into place by rename.
//!
//! The staging name is derived from the BLAKE3 digest of the resolved
//! manifest, so a rerun of the same plan reuses (and first clears) the
//! same directory. A crash before publish leaves only the staging
//! directory behind; the published tree is replaced by renames only.

use super::error::BuildError;
use super::manifest::digest;
use super::types::RecipePlan;
use std::path::{Path, PathBuf};

const DIGEST_CHARS: usize = 16;

/// Staging directory for building `plan` before publishing to `publish_to`.
pub fn staging_dir(publish_to: &Path, plan: &RecipePlan) -> Result<PathBuf, BuildError> {
    let name = publish_to
        .file_name()
        .ok_or_else(|| BuildError::Config {
            path: publish_to.to_path_buf(),
            message: "publish_to has no directory name".to_string(),
        })?
        .to_string_lossy();
    let hash = digest(plan);
    let short = &hash[..DIGEST_CHARS.min(hash.len())];
    Ok(publish_to.with_file_name(format!(".{}.{}.staging", name, short)))
}

/// Create a fresh, empty staging directory, removing leftovers of an
/// interrupted run.
pub fn prepare(staging: &Path) -> Result<(), BuildError> {
    if staging.exists() {
        tracing::warn!(path = %staging.display(), "removing stale staging directory");
        std::fs::remove_dir_all(staging).map_err(|e| BuildError::io(staging, e))?;
    }
    std::fs::create_dir_all(staging).map_err(|e| BuildError::io(staging, e))
}

/// Where the previously published tree waits while a new one is swapped
/// in. Sits next to `staging` and shares its digest.
pub fn retired_dir(staging: &Path) -> PathBuf {
    staging.with_extension("previous")
}

/// Move the finished tree into place.
///
/// An existing tree at `publish_to` is first renamed aside, then the new
/// tree is renamed in, then the old one is deleted. If the second rename
/// fails the old tree is moved back. A crash in between leaves the old
/// tree in [`retired_dir`], never deleted.
pub fn publish(staging: &Path, publish_to: &Path) -> Result<(), BuildError> {
    let retired = retired_dir(staging);
    if retired.exists() {
        tracing::warn!(path = %retired.display(), "removing tree retired by an interrupted publish");
        std::fs::remove_dir_all(&retired).map_err(|e| BuildError::io(&retired, e))?;
    }

    let replacing = publish_to.exists();
    if replacing {
        std::fs::rename(publish_to, &retired).map_err(|e| BuildError::io(publish_to, e))?;
    }
    if let Err(e) = std::fs::rename(staging, publish_to) {
        if replacing {
            if let Err(restore) = std::fs::rename(&retired, publish_to) {
                tracing::warn!(
                    path = %retired.display(),
                    error = %restore,
                    "cannot restore previous tree"
                );
            }
        }
        return Err(BuildError::io(publish_to, e));
    }
    tracing::info!(from = %staging.display(), to = %publish_to.display(), "published");

    if replacing {
        std::fs::remove_dir_all(&retired).map_err(|e| BuildError::io(&retired, e))?;
    }
    Ok(())
}
