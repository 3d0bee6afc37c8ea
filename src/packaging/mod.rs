//! Packaging stage: `{debversion}`, `{debupstream}` and
//! `{debupstream-base}` come from the previous package version, which
//! only exists once the tree has been built.

pub mod changelog;
pub mod version;

pub use changelog::ChangelogMetadata;
pub use version::DebVersion;

use crate::core::error::{BuildError, SubstitutionError};
use crate::core::format::{FormatVersion, Token};
use crate::core::substitution::{check_expanded, PACKAGING_TOKENS};
use crate::core::types::RecipePlan;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static PACKAGING_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(debversion|debupstream-base|debupstream)(?::([^}]+))?\}")
        .expect("packaging token pattern")
});

/// Source of the previously released package version.
pub trait PackagingMetadata {
    /// Newest known version for the tree at `tree`, or None if there is
    /// no prior release to take it from.
    fn previous_version(&self, tree: &Path) -> Result<Option<DebVersion>, BuildError>;
}

/// Expand the packaging tokens legal at `format`, bare or scoped to a
/// branch (`{debupstream:pkg}`).
///
/// `previous` is asked once per distinct scope (None for the bare form)
/// and only for scopes the template uses. A token whose scope has no
/// previous version fails with [`SubstitutionError::Unavailable`].
pub fn expand_packaging_tokens<F>(
    template: &str,
    format: FormatVersion,
    mut previous: F,
) -> Result<String, BuildError>
where
    F: FnMut(Option<&str>) -> Result<Option<DebVersion>, BuildError>,
{
    let mut known: HashMap<Option<String>, Option<DebVersion>> = HashMap::new();
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PACKAGING_TOKEN.captures_iter(template) {
        let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(token) = PACKAGING_TOKENS
            .into_iter()
            .find(|token| token.name() == word.as_str())
        else {
            continue;
        };
        if !token.available_in(&format) {
            continue;
        }

        let scope = caps.get(2).map(|m| m.as_str().to_string());
        let version = match known.get(&scope) {
            Some(version) => version.clone(),
            None => {
                let version = previous(scope.as_deref())?;
                known.insert(scope, version.clone());
                version
            }
        };
        let version = version.ok_or_else(|| SubstitutionError::Unavailable {
            token: whole.as_str().to_string(),
            reason: unavailable_reason(token).to_string(),
        })?;

        out.push_str(&template[last..whole.start()]);
        out.push_str(&match token {
            Token::DebVersion => version.to_string(),
            Token::DebUpstreamBase => version.upstream_base(),
            _ => version.upstream.clone(),
        });
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

fn unavailable_reason(token: Token) -> &'static str {
    match token {
        Token::DebVersion => "No previous changelog to take the version from",
        _ => "No previous changelog to take the upstream version from",
    }
}

/// Finish the plan's `deb-version` against the built tree at `tree`.
///
/// Bare tokens read the root tree; scoped tokens read the tree of the
/// named branch. Metadata is only consulted for scopes the template
/// uses. Afterwards no token may remain and the result must be a valid
/// Debian version.
pub fn finish_deb_version(
    plan: &mut RecipePlan,
    metadata: &dyn PackagingMetadata,
    tree: &Path,
) -> Result<(), BuildError> {
    let Some(template) = plan.deb_version() else {
        return Ok(());
    };
    let expanded = expand_packaging_tokens(template, plan.format(), |scope| {
        let dir = match scope {
            None => tree.to_path_buf(),
            Some(name) => {
                let relative = plan.tree_dir_of(name).ok_or_else(|| SubstitutionError::UnknownBranch {
                    name: name.to_string(),
                })?;
                tree.join(relative)
            }
        };
        metadata.previous_version(&dir)
    })?;
    finalize(plan, expanded)
}

/// Finish the plan's `deb-version` when no packaging metadata is
/// available. Any packaging token left in the template is unavailable.
pub fn finish_without_metadata(plan: &mut RecipePlan) -> Result<(), BuildError> {
    let Some(template) = plan.deb_version() else {
        return Ok(());
    };
    let expanded = expand_packaging_tokens(template, plan.format(), |_| Ok(None))?;
    finalize(plan, expanded)
}

fn finalize(plan: &mut RecipePlan, expanded: String) -> Result<(), BuildError> {
    check_expanded(&expanded, plan.format(), plan.branch_names(), false)?;
    if DebVersion::parse(&expanded).is_none() {
        return Err(SubstitutionError::InvalidVersion { version: expanded }.into());
    }
    tracing::info!(deb_version = %expanded, "final deb-version");
    plan.set_deb_version(expanded);
    Ok(())
}
