//! RB-007: Revision resolution.
//!
//! Walks the plan depth-first in document order and asks the VCS provider
//! for the concrete revision of every branch, then expands the root's
//! `deb-version` template against the resolved tree.

use super::error::BuildError;
use super::substitution::{check_expanded, substitute_revnos};
use super::types::{BranchNode, RecipePlan};
use crate::vcs::VcsProvider;

/// Resolve every unresolved branch in `plan`. Returns how many branches
/// were resolved by this call.
pub fn resolve_revisions(plan: &mut RecipePlan, provider: &dyn VcsProvider) -> Result<usize, BuildError> {
    let mut resolved = 0;
    resolve_node(plan.root_mut(), provider, &mut resolved)?;
    tracing::debug!(resolved, "resolved revisions");
    Ok(resolved)
}

fn resolve_node(
    node: &mut BranchNode,
    provider: &dyn VcsProvider,
    resolved: &mut usize,
) -> Result<(), BuildError> {
    if node.resolved_revision().is_none() {
        let revision = provider
            .resolve(&node.location, node.revision_spec.as_deref())
            .map_err(|source| BuildError::Resolution {
                branch: node.label().to_string(),
                location: node.location.clone(),
                source,
            })?;
        tracing::info!(
            branch = node.label(),
            spec = node.revision_spec.as_deref().unwrap_or("latest"),
            %revision,
            "resolved"
        );
        node.set_resolved_revision(revision);
        *resolved += 1;
    }
    for child in node.children.iter_mut() {
        if let Some(branch) = child.branch_mut() {
            resolve_node(branch, provider, resolved)?;
        }
    }
    Ok(())
}

/// Run the revno pass over the root template and require that only
/// packaging tokens remain. No-op when the recipe has no template.
pub fn resolve_deb_version(plan: &mut RecipePlan, provider: &dyn VcsProvider) -> Result<(), BuildError> {
    let Some(template) = plan.deb_version() else {
        return Ok(());
    };
    let expanded = substitute_revnos(template, plan, provider)?;
    check_expanded(&expanded, plan.format(), plan.branch_names(), true)?;
    if expanded != template {
        tracing::info!(deb_version = %expanded, "substituted deb-version");
    }
    plan.set_deb_version(expanded);
    Ok(())
}
