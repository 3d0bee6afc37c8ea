//! RB-011: Change detection — resolve a fresh plan and diff it against
//! the manifest of the previous build.

use super::error::BuildError;
use super::manifest::pinned_revision;
use super::resolver::{resolve_deb_version, resolve_revisions};
use super::types::{BranchNode, RecipePlan};
use crate::vcs::VcsProvider;
use std::fmt;

/// Why a build is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    /// No previous manifest.
    FirstBuild,
    /// Branches, locations or instructions differ.
    ShapeChanged,
    /// A branch now resolves to a different revision.
    RevisionChanged { branch: String },
    /// A branch's explicit revision spec was edited.
    PinChanged { branch: String },
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstBuild => write!(f, "no previous manifest"),
            Self::ShapeChanged => write!(f, "recipe structure changed"),
            Self::RevisionChanged { branch } => write!(f, "new revision of {}", branch),
            Self::PinChanged { branch } => write!(f, "revision spec of {} changed", branch),
        }
    }
}

/// Outcome of [`resolve_and_compare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    Changed(ChangeReason),
    Unchanged,
}

impl ChangeStatus {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Resolve `plan` and compare it with `old`, the plan of the previous
/// build (read-only).
///
/// The deb-version revno pass runs whatever the outcome, so the caller
/// always gets a fully resolved plan back.
pub fn resolve_and_compare(
    plan: &mut RecipePlan,
    old: Option<&RecipePlan>,
    provider: &dyn VcsProvider,
) -> Result<ChangeStatus, BuildError> {
    resolve_revisions(plan, provider)?;
    let status = match old {
        None => ChangeStatus::Changed(ChangeReason::FirstBuild),
        Some(old) => compare(plan, old, provider)?,
    };
    resolve_deb_version(plan, provider)?;

    match &status {
        ChangeStatus::Changed(reason) => tracing::info!(%reason, "changed"),
        ChangeStatus::Unchanged => tracing::info!("unchanged"),
    }
    Ok(status)
}

/// Compare a resolved plan against an old one, node by node.
fn compare(
    plan: &RecipePlan,
    old: &RecipePlan,
    provider: &dyn VcsProvider,
) -> Result<ChangeStatus, BuildError> {
    if !plan.shape_equals(old) {
        return Ok(ChangeStatus::Changed(ChangeReason::ShapeChanged));
    }
    for (new_node, old_node) in plan.root().walk().into_iter().zip(old.root().walk()) {
        if pin_changed(new_node, old_node) {
            return Ok(ChangeStatus::Changed(ChangeReason::PinChanged {
                branch: new_node.label().to_string(),
            }));
        }
        let new_revision = new_node
            .resolved_revision()
            .ok_or_else(|| BuildError::Unresolved {
                branch: new_node.label().to_string(),
            })?;
        if old_revision(old_node, provider)? != new_revision {
            return Ok(ChangeStatus::Changed(ChangeReason::RevisionChanged {
                branch: new_node.label().to_string(),
            }));
        }
    }
    Ok(ChangeStatus::Unchanged)
}

/// The user's revision specs differ, including a pin added or removed.
/// A `revid:` spec on either side is a recorded revision, not a pin, and
/// is left to the revision comparison.
fn pin_changed(new_node: &BranchNode, old_node: &BranchNode) -> bool {
    let new_spec = new_node.revision_spec.as_deref();
    let old_spec = old_node.revision_spec.as_deref();
    if pinned_revision(new_spec).is_some() || pinned_revision(old_spec).is_some() {
        return false;
    }
    new_spec != old_spec
}

/// The revision the old build used. Manifests record it; a bare recipe
/// used as the old plan is resolved through the provider.
fn old_revision(node: &BranchNode, provider: &dyn VcsProvider) -> Result<String, BuildError> {
    if let Some(revision) = node.resolved_revision() {
        return Ok(revision.to_string());
    }
    if let Some(revision) = pinned_revision(node.revision_spec.as_deref()) {
        return Ok(revision.to_string());
    }
    provider
        .resolve(&node.location, node.revision_spec.as_deref())
        .map_err(|source| BuildError::Resolution {
            branch: node.label().to_string(),
            location: node.location.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::V0_4;
    use crate::core::manifest::serialize;
    use crate::core::parser::parse_recipe;
    use crate::vcs::scripted::ScriptedVcs;

    const RECIPE: &str = "# builder format 0.4 deb-version 1-{revno}\n\
                          lp:root\n\
                          nest pkg lp:pkg debian\n\
                          \x20 merge fix lp:fix\n";

    fn vcs(fix_head: &str) -> ScriptedVcs {
        ScriptedVcs::default()
            .head("lp:root", "r-1")
            .head("lp:pkg", "p-1")
            .head("lp:fix", fix_head)
            .revno("r-1", "42")
    }

    /// Resolve RECIPE and reparse its manifest, as a previous build would
    /// have left it.
    fn previous_build(fix_head: &str) -> RecipePlan {
        let mut plan = parse_recipe(RECIPE).unwrap();
        resolve_and_compare(&mut plan, None, &vcs(fix_head)).unwrap();
        let mut old = parse_recipe(&serialize(&plan)).unwrap();
        // Adopt the revid pins like load_manifest does.
        resolve_revisions(&mut old, &ScriptedVcs::default()).unwrap();
        old
    }

    #[test]
    fn test_rb011_first_build_is_changed() {
        let mut plan = parse_recipe(RECIPE).unwrap();
        let status = resolve_and_compare(&mut plan, None, &vcs("f-1")).unwrap();
        assert_eq!(status, ChangeStatus::Changed(ChangeReason::FirstBuild));
        assert_eq!(plan.deb_version(), Some("1-42"));
    }

    #[test]
    fn test_rb011_identical_is_unchanged() {
        let old = previous_build("f-1");
        let mut plan = parse_recipe(RECIPE).unwrap();
        let status = resolve_and_compare(&mut plan, Some(&old), &vcs("f-1")).unwrap();
        assert_eq!(status, ChangeStatus::Unchanged);
        assert!(!status.is_changed());
        // The revno pass still runs for an unchanged build.
        assert_eq!(plan.deb_version(), Some("1-42"));
    }

    #[test]
    fn test_rb011_nested_revision_change() {
        let old = previous_build("f-1");
        let mut plan = parse_recipe(RECIPE).unwrap();
        let status = resolve_and_compare(&mut plan, Some(&old), &vcs("f-2")).unwrap();
        assert_eq!(
            status,
            ChangeStatus::Changed(ChangeReason::RevisionChanged {
                branch: "fix".to_string()
            })
        );
    }

    #[test]
    fn test_rb011_shape_change_wins() {
        let old = previous_build("f-1");
        let mut plan = parse_recipe(&format!("{}merge extra lp:extra\n", RECIPE)).unwrap();
        let vcs = vcs("f-1").head("lp:extra", "e-1");
        let status = resolve_and_compare(&mut plan, Some(&old), &vcs).unwrap();
        assert_eq!(status, ChangeStatus::Changed(ChangeReason::ShapeChanged));
        assert!(plan.is_resolved());
    }

    #[test]
    fn test_rb011_pin_change_counts_even_on_same_revision() {
        let old = parse_recipe("# builder format 0.4\nlp:root tag:1.0\n").unwrap();
        let mut plan = parse_recipe("# builder format 0.4\nlp:root tag:1.0-final\n").unwrap();
        let vcs = ScriptedVcs::default()
            .pin("lp:root", "tag:1.0", "r-1")
            .pin("lp:root", "tag:1.0-final", "r-1");
        let status = resolve_and_compare(&mut plan, Some(&old), &vcs).unwrap();
        assert_eq!(
            status,
            ChangeStatus::Changed(ChangeReason::PinChanged {
                branch: "lp:root".to_string()
            })
        );
    }

    #[test]
    fn test_rb011_pin_added_or_removed_counts() {
        let vcs = ScriptedVcs::default()
            .head("lp:root", "r-1")
            .pin("lp:root", "tag:1.0", "r-1");
        let bare = "# builder format 0.4\nlp:root\n";
        let pinned = "# builder format 0.4\nlp:root tag:1.0\n";
        let expected = ChangeStatus::Changed(ChangeReason::PinChanged {
            branch: "lp:root".to_string(),
        });

        let old = parse_recipe(bare).unwrap();
        let mut plan = parse_recipe(pinned).unwrap();
        assert_eq!(resolve_and_compare(&mut plan, Some(&old), &vcs).unwrap(), expected);

        let old = parse_recipe(pinned).unwrap();
        let mut plan = parse_recipe(bare).unwrap();
        assert_eq!(resolve_and_compare(&mut plan, Some(&old), &vcs).unwrap(), expected);
    }

    #[test]
    fn test_rb011_manifest_revid_is_not_a_pin() {
        let old = RecipePlan::new(
            BranchNode::base("lp:root").with_revision_spec("revid:r-1"),
            None,
            V0_4,
        );
        let mut plan = parse_recipe("# builder format 0.4\nlp:root tag:1.0\n").unwrap();
        let vcs = ScriptedVcs::default().pin("lp:root", "tag:1.0", "r-1");
        let status = resolve_and_compare(&mut plan, Some(&old), &vcs).unwrap();
        assert_eq!(status, ChangeStatus::Unchanged);
    }

    #[test]
    fn test_rb011_old_recipe_resolved_through_provider() {
        let old = parse_recipe("# builder format 0.4\nlp:root tag:1.0\n").unwrap();
        let mut plan = parse_recipe("# builder format 0.4\nlp:root tag:1.0\n").unwrap();
        let vcs = ScriptedVcs::default().pin("lp:root", "tag:1.0", "r-1");
        let status = resolve_and_compare(&mut plan, Some(&old), &vcs).unwrap();
        assert_eq!(status, ChangeStatus::Unchanged);
    }

    #[test]
    fn test_rb011_revid_pin_compared_by_revision() {
        let old = RecipePlan::new(
            BranchNode::base("lp:root").with_revision_spec("revid:r-1"),
            None,
            V0_4,
        );
        let mut plan = parse_recipe("# builder format 0.4\nlp:root\n").unwrap();
        let unchanged = resolve_and_compare(&mut plan, Some(&old), &ScriptedVcs::default().head("lp:root", "r-1"));
        assert_eq!(unchanged.unwrap(), ChangeStatus::Unchanged);

        let mut plan = parse_recipe("# builder format 0.4\nlp:root\n").unwrap();
        let changed = resolve_and_compare(&mut plan, Some(&old), &ScriptedVcs::default().head("lp:root", "r-2"));
        assert!(changed.unwrap().is_changed());
    }

    #[test]
    fn test_rb011_reason_display() {
        assert_eq!(ChangeReason::FirstBuild.to_string(), "no previous manifest");
        assert_eq!(
            ChangeReason::RevisionChanged {
                branch: "fix".to_string()
            }
            .to_string(),
            "new revision of fix"
        );
    }
}
