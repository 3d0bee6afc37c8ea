//! RB-005: Manifest — canonical serialization, atomic save, load.
//!
//! A manifest is recipe text in which every branch line carries the
//! concrete revision it was built from (`revid:<id>`). It parses with the
//! ordinary recipe parser.

use super::error::BuildError;
use super::parser::{parse_recipe_file, ParseOptions, PRODUCT_TAG};
use super::types::{BranchNode, Instruction, RecipePlan};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Prefix marking a revision spec that pins an exact revision id.
pub const REVID_PREFIX: &str = "revid:";

/// Spec written for an unresolved `nest-part`, whose grammar needs one.
const LATEST_REVISION_SPEC: &str = "-1";

const INDENT: &str = "  ";

/// Render `plan` as canonical recipe text.
///
/// Resolved branches are written with `revid:<resolved>`; unresolved ones
/// keep their original revision spec.
pub fn serialize(plan: &RecipePlan) -> String {
    let mut out = format!("# {} format {}", PRODUCT_TAG, plan.format());
    if let Some(template) = plan.deb_version() {
        let _ = write!(out, " deb-version {}", template);
    }
    out.push('\n');

    let root = plan.root();
    out.push_str(&root.location);
    if let Some(spec) = effective_spec(root) {
        out.push(' ');
        out.push_str(&spec);
    }
    out.push('\n');
    write_children(&mut out, root, 0);
    out
}

/// The revision spec a serialized line carries for `branch`.
fn effective_spec(branch: &BranchNode) -> Option<String> {
    match branch.resolved_revision() {
        Some(revision) => Some(format!("{}{}", REVID_PREFIX, revision)),
        None => branch.revision_spec.clone(),
    }
}

fn write_children(out: &mut String, node: &BranchNode, depth: usize) {
    for instruction in &node.children {
        out.push_str(&INDENT.repeat(depth));
        match instruction {
            Instruction::Merge { branch } => {
                let _ = write!(out, "merge {} {}", branch.label(), branch.location);
                push_optional(out, effective_spec(branch));
            }
            Instruction::Nest { branch, target_dir } => {
                let _ = write!(out, "nest {} {} {}", branch.label(), branch.location, target_dir);
                push_optional(out, effective_spec(branch));
            }
            Instruction::NestPart {
                branch,
                source_subpath,
                target_dir,
            } => {
                let spec = effective_spec(branch).unwrap_or_else(|| LATEST_REVISION_SPEC.to_string());
                let _ = write!(
                    out,
                    "nest-part {} {} {} {} {}",
                    branch.label(),
                    branch.location,
                    spec,
                    source_subpath,
                    target_dir
                );
            }
            Instruction::Run { command } => {
                let _ = write!(out, "run {}", command);
            }
        }
        out.push('\n');
        if let Some(branch) = instruction.branch() {
            write_children(out, branch, depth + 1);
        }
    }
}

fn push_optional(out: &mut String, spec: Option<String>) {
    if let Some(spec) = spec {
        out.push(' ');
        out.push_str(&spec);
    }
}

/// BLAKE3 digest of the canonical serialization, as hex.
pub fn digest(plan: &RecipePlan) -> String {
    blake3::hash(serialize(plan).as_bytes()).to_hex().to_string()
}

/// Write the manifest atomically (temp file, then rename).
pub fn write_manifest(path: &Path, plan: &RecipePlan) -> Result<(), BuildError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }

    let tmp_path = temp_path(path);
    std::fs::write(&tmp_path, serialize(plan)).map_err(|e| BuildError::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| BuildError::io(path, e))?;

    tracing::info!(path = %path.display(), "wrote manifest");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Load a previously written manifest. Returns None if the file doesn't
/// exist, which callers treat as a first build.
///
/// `revid:` pins are adopted as the nodes' resolved revisions.
pub fn load_manifest(path: &Path) -> Result<Option<RecipePlan>, BuildError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no previous manifest");
        return Ok(None);
    }
    let mut plan = parse_recipe_file(path, &ParseOptions::default())?;
    adopt_pins(plan.root_mut());
    Ok(Some(plan))
}

fn adopt_pins(node: &mut BranchNode) {
    if let Some(revision) = pinned_revision(node.revision_spec.as_deref()) {
        node.set_resolved_revision(revision.to_string());
    }
    for child in node.children.iter_mut() {
        if let Some(branch) = child.branch_mut() {
            adopt_pins(branch);
        }
    }
}

/// The revision id inside a `revid:` spec.
pub fn pinned_revision(spec: Option<&str>) -> Option<&str> {
    spec?.strip_prefix(REVID_PREFIX).filter(|id| !id.is_empty())
}
