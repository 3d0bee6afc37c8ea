//! RB-012: Debian version strings — `[epoch:]upstream[-revision]`.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static VCS_SNAPSHOT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([~+])(svn[0-9]+|bzr[0-9]+|git[0-9a-f]+)").expect("snapshot marker pattern")
});

/// A parsed Debian package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebVersion {
    pub epoch: Option<String>,
    pub upstream: String,
    pub revision: Option<String>,
}

impl DebVersion {
    /// Split `text` into its parts. Returns None unless the upstream part
    /// is non-empty, starts with a digit and uses only legal characters.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (epoch, rest) = match text.split_once(':') {
            Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) => {
                (Some(epoch.to_string()), rest)
            }
            Some(_) => return None,
            None => (None, text),
        };
        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((upstream, revision)) => (upstream, Some(revision)),
            None => (rest, None),
        };

        let upstream_ok = upstream.starts_with(|c: char| c.is_ascii_digit())
            && upstream
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || ".+~-:".contains(c));
        let revision_ok = revision.map_or(true, |r| {
            !r.is_empty() && r.chars().all(|c| c.is_ascii_alphanumeric() || ".+~".contains(c))
        });
        if !upstream_ok || !revision_ok {
            return None;
        }

        Some(Self {
            epoch,
            upstream: upstream.to_string(),
            revision: revision.map(str::to_string),
        })
    }

    /// Upstream part with VCS snapshot markers (`~bzr123`, `+git1a2b`)
    /// removed, always ending in `~` or `+`.
    pub fn upstream_base(&self) -> String {
        let mut base = VCS_SNAPSHOT_MARKER
            .replace_all(&self.upstream, "$1")
            .into_owned();
        if !base.ends_with(['~', '+']) {
            base.push('+');
        }
        base
    }
}

impl fmt::Display for DebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = &self.epoch {
            write!(f, "{}:", epoch)?;
        }
        f.write_str(&self.upstream)?;
        if let Some(revision) = &self.revision {
            write!(f, "-{}", revision)?;
        }
        Ok(())
    }
}
