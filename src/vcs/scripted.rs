//! In-memory VCS provider for tests. Answers from scripted tables,
//! records every call in order, and never touches the filesystem.

use super::{MergeOutcome, VcsProvider};
use crate::core::error::VcsError;
use crate::core::manifest::pinned_revision;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VcsCall {
    Resolve {
        location: String,
        spec: Option<String>,
    },
    Revno {
        location: String,
        revision: String,
    },
    Checkout {
        location: String,
        revision: String,
        target: PathBuf,
    },
    Merge {
        location: String,
        revision: String,
        target: PathBuf,
    },
    Commit {
        target: PathBuf,
        message: String,
    },
    Export {
        location: String,
        revision: String,
        subpath: String,
        target: PathBuf,
    },
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedVcs {
    heads: HashMap<String, String>,
    pinned: HashMap<(String, String), String>,
    revnos: HashMap<String, String>,
    merges: HashMap<String, MergeOutcome>,
    checkout_conflicts: Vec<String>,
    broken: HashSet<String>,
    calls: RefCell<Vec<VcsCall>>,
}

impl ScriptedVcs {
    /// Latest revision of `location`.
    pub(crate) fn head(mut self, location: &str, revision: &str) -> Self {
        self.heads.insert(location.to_string(), revision.to_string());
        self
    }

    /// Revision selected by `spec` on `location`.
    pub(crate) fn pin(mut self, location: &str, spec: &str, revision: &str) -> Self {
        self.pinned
            .insert((location.to_string(), spec.to_string()), revision.to_string());
        self
    }

    pub(crate) fn revno(mut self, revision: &str, revno: &str) -> Self {
        self.revnos.insert(revision.to_string(), revno.to_string());
        self
    }

    pub(crate) fn merge_outcome(mut self, location: &str, outcome: MergeOutcome) -> Self {
        self.merges.insert(location.to_string(), outcome);
        self
    }

    pub(crate) fn checkout_conflicts(mut self, paths: &[&str]) -> Self {
        self.checkout_conflicts = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Every operation on `location` fails.
    pub(crate) fn broken(mut self, location: &str) -> Self {
        self.broken.insert(location.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<VcsCall> {
        self.calls.borrow().clone()
    }

    pub(crate) fn revno_calls(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, VcsCall::Revno { .. }))
            .count()
    }

    fn record(&self, call: VcsCall) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, location: &str) -> Result<(), VcsError> {
        if self.broken.contains(location) {
            return Err(VcsError::new(format!("not a branch: {}", location)));
        }
        Ok(())
    }
}

impl VcsProvider for ScriptedVcs {
    fn resolve(&self, location: &str, revision_spec: Option<&str>) -> Result<String, VcsError> {
        self.record(VcsCall::Resolve {
            location: location.to_string(),
            spec: revision_spec.map(str::to_string),
        });
        self.check(location)?;
        if let Some(revision) = pinned_revision(revision_spec) {
            return Ok(revision.to_string());
        }
        let found = match revision_spec {
            Some(spec) => self.pinned.get(&(location.to_string(), spec.to_string())),
            None => self.heads.get(location),
        };
        found
            .cloned()
            .ok_or_else(|| VcsError::new(format!("no revision matches {:?}", revision_spec)))
    }

    fn revno_of(&self, location: &str, revision: &str) -> Result<Option<String>, VcsError> {
        self.record(VcsCall::Revno {
            location: location.to_string(),
            revision: revision.to_string(),
        });
        self.check(location)?;
        Ok(self.revnos.get(revision).cloned())
    }

    fn checkout_or_update(
        &self,
        location: &str,
        revision: &str,
        target: &Path,
    ) -> Result<Vec<String>, VcsError> {
        self.record(VcsCall::Checkout {
            location: location.to_string(),
            revision: revision.to_string(),
            target: target.to_path_buf(),
        });
        self.check(location)?;
        Ok(self.checkout_conflicts.clone())
    }

    fn merge(&self, location: &str, revision: &str, target: &Path) -> Result<MergeOutcome, VcsError> {
        self.record(VcsCall::Merge {
            location: location.to_string(),
            revision: revision.to_string(),
            target: target.to_path_buf(),
        });
        self.check(location)?;
        Ok(self
            .merges
            .get(location)
            .cloned()
            .unwrap_or(MergeOutcome::Merged))
    }

    fn commit(&self, target: &Path, message: &str) -> Result<(), VcsError> {
        self.record(VcsCall::Commit {
            target: target.to_path_buf(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn export_subpath(
        &self,
        location: &str,
        revision: &str,
        subpath: &str,
        target: &Path,
    ) -> Result<(), VcsError> {
        self.record(VcsCall::Export {
            location: location.to_string(),
            revision: revision.to_string(),
            subpath: subpath.to_string(),
            target: target.to_path_buf(),
        });
        self.check(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rb009_resolve_tables() {
        let vcs = ScriptedVcs::default()
            .head("lp:x", "x-2")
            .pin("lp:x", "tag:1", "x-1");
        assert_eq!(vcs.resolve("lp:x", None).unwrap(), "x-2");
        assert_eq!(vcs.resolve("lp:x", Some("tag:1")).unwrap(), "x-1");
        assert_eq!(vcs.resolve("lp:x", Some("revid:abc")).unwrap(), "abc");
        assert!(vcs.resolve("lp:x", Some("tag:9")).is_err());
        assert_eq!(vcs.calls().len(), 4);
    }

    #[test]
    fn test_rb009_broken_location() {
        let vcs = ScriptedVcs::default().broken("lp:gone");
        let err = vcs.resolve("lp:gone", None).unwrap_err();
        assert_eq!(err.message, "not a branch: lp:gone");
    }
}
