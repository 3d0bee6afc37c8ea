//! RB-006: `deb-version` template substitution.
//!
//! Each pass is a pure `template -> template` function; the plan keeps
//! its identity and the caller stores the result. Passes run in order:
//! time, then revno (VCS lookups), then packaging (see `crate::packaging`),
//! and finally the no-remaining-token check.

use super::error::{BuildError, SubstitutionError};
use super::format::{available_placeholders, FormatVersion, Token};
use super::types::RecipePlan;
use crate::vcs::VcsProvider;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static REVNO_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{revno(?::([^}]+))?\}").expect("revno token pattern"));

/// Replace `{time}` (`YYYYMMDDHHMM`) and `{date}` (`YYYYMMDD`) using one
/// timestamp captured per build. Tokens gated above `format` are left in
/// place.
pub fn substitute_time(template: &str, format: FormatVersion, now: DateTime<Utc>) -> String {
    let mut out = template.to_string();
    for (token, pattern) in [(Token::Time, "%Y%m%d%H%M"), (Token::Date, "%Y%m%d")] {
        if token.available_in(&format) {
            out = out.replace(&token.placeholder(None), &now.format(pattern).to_string());
        }
    }
    out
}

/// Replace `{revno}` and `{revno:<name>}` with revnos from `provider`.
///
/// Only branches the template actually references are queried, each at
/// most once. The plan must already be resolved.
pub fn substitute_revnos(
    template: &str,
    plan: &RecipePlan,
    provider: &dyn VcsProvider,
) -> Result<String, BuildError> {
    if !Token::Revno.available_in(&plan.format()) {
        return Ok(template.to_string());
    }

    let mut known: HashMap<Option<&str>, String> = HashMap::new();
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in REVNO_TOKEN.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        let name = caps.get(1).map(|m| m.as_str());
        let revno = match known.get(&name) {
            Some(revno) => revno.clone(),
            None => {
                let revno = lookup_revno(plan, name, provider)?;
                known.insert(name, revno.clone());
                revno
            }
        };
        out.push_str(&template[last..whole.start()]);
        out.push_str(&revno);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

fn lookup_revno(
    plan: &RecipePlan,
    name: Option<&str>,
    provider: &dyn VcsProvider,
) -> Result<String, BuildError> {
    let branch = match name {
        None => plan.root(),
        Some(name) => plan
            .find_branch(name)
            .ok_or_else(|| SubstitutionError::UnknownBranch {
                name: name.to_string(),
            })?,
    };
    let revision = branch
        .resolved_revision()
        .ok_or_else(|| BuildError::Unresolved {
            branch: branch.label().to_string(),
        })?;
    let revno = provider
        .revno_of(&branch.location, revision)
        .map_err(|source| BuildError::Vcs {
            branch: branch.label().to_string(),
            operation: "revno lookup",
            source,
        })?;
    tracing::debug!(branch = branch.label(), revision, ?revno, "revno lookup");
    revno.ok_or_else(|| {
        SubstitutionError::RevnoUnavailable {
            branch: branch.label().to_string(),
        }
        .into()
    })
}

/// Fail if any `{` remains in `template`.
///
/// With `preserve_packaging`, packaging tokens legal at `format` are
/// allowed to remain, bare or scoped to a known branch; they are expanded
/// later by the packaging stage.
pub fn check_expanded<'a>(
    template: &str,
    format: FormatVersion,
    branch_names: impl IntoIterator<Item = &'a str> + Clone,
    preserve_packaging: bool,
) -> Result<(), SubstitutionError> {
    let mut checked = template.to_string();
    if preserve_packaging {
        for token in PACKAGING_TOKENS {
            if !token.available_in(&format) {
                continue;
            }
            for name in branch_names.clone() {
                checked = checked.replace(&token.placeholder(Some(name)), "");
            }
            checked = checked.replace(&token.placeholder(None), "");
        }
    }
    if checked.contains('{') {
        return Err(SubstitutionError::NotFullyExpanded {
            template: template.to_string(),
            format,
            available: available_placeholders(&format, branch_names),
        });
    }
    Ok(())
}

pub(crate) const PACKAGING_TOKENS: [Token; 3] =
    [Token::DebVersion, Token::DebUpstreamBase, Token::DebUpstream];
