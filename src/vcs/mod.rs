//! RB-009: Version-control provider interface.
//!
//! The core never talks to a VCS directly. Resolution, revno lookup and
//! every tree mutation during a build go through [`VcsProvider`].

#[cfg(test)]
pub(crate) mod scripted;

use crate::core::error::VcsError;
use std::path::Path;

/// Result of merging one branch into a working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New changes were merged; a commit should record them.
    Merged,
    /// Nothing to merge.
    UpToDate,
    /// The merge left conflicts in these paths.
    Conflicted(Vec<String>),
}

/// Operations the builder needs from a version-control system.
pub trait VcsProvider {
    /// Resolve a location and optional revision spec to a revision id.
    /// `None` selects the latest revision.
    fn resolve(&self, location: &str, revision_spec: Option<&str>) -> Result<String, VcsError>;

    /// Revision number of `revision` on the branch at `location`, if the
    /// VCS has one.
    fn revno_of(&self, location: &str, revision: &str) -> Result<Option<String>, VcsError>;

    /// Check out `revision` into `target`, or update an existing checkout
    /// there. Returns the paths left conflicted or modified.
    fn checkout_or_update(
        &self,
        location: &str,
        revision: &str,
        target: &Path,
    ) -> Result<Vec<String>, VcsError>;

    /// Merge `revision` from `location` into the working tree at `target`.
    fn merge(&self, location: &str, revision: &str, target: &Path) -> Result<MergeOutcome, VcsError>;

    /// Record a commit of the working tree at `target`.
    fn commit(&self, target: &Path, message: &str) -> Result<(), VcsError>;

    /// Copy `subpath` of `revision` into `target`, without history.
    fn export_subpath(
        &self,
        location: &str,
        revision: &str,
        subpath: &str,
        target: &Path,
    ) -> Result<(), VcsError>;
}
