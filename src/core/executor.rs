//! RB-015: Executor — materializes a resolved plan, and the apply loop.
//!
//! apply: parse → time substitution → load old manifest → resolve + compare
//! → (unchanged: stop) → build tree → packaging → manifests → publish
//!
//! Without packaging metadata the deb-version is finished before the
//! build, so a template that needs a previous version fails early.

use super::config::BuildOptions;
use super::error::BuildError;
use super::manifest::{load_manifest, write_manifest};
use super::parser::{parse_recipe_file, ParseOptions};
use super::planner::{resolve_and_compare, ChangeStatus};
use super::staging;
use super::substitution::substitute_time;
use super::types::{BranchNode, Instruction, RecipePlan};
use crate::packaging::{finish_deb_version, finish_without_metadata, PackagingMetadata};
use crate::transport::CommandRunner;
use crate::vcs::{MergeOutcome, VcsProvider};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Everything an apply run needs.
pub struct ApplyConfig<'a> {
    pub recipe_path: &'a Path,
    /// Working tree to build into when not publishing.
    pub target: &'a Path,
    pub options: &'a BuildOptions,
    pub provider: &'a dyn VcsProvider,
    pub runner: &'a dyn CommandRunner,
    /// Enables the packaging stage for `{debupstream}`-class tokens.
    pub packaging: Option<&'a dyn PackagingMetadata>,
    /// Timestamp for `{time}` and `{date}`, captured once per build.
    pub now: DateTime<Utc>,
}

/// Result of an apply run.
#[derive(Debug)]
pub struct ApplyResult {
    pub status: ChangeStatus,
    /// The resolved plan, with its final `deb-version`.
    pub plan: RecipePlan,
    /// Where the tree ended up; None if nothing was built.
    pub tree: Option<PathBuf>,
    pub steps: usize,
    pub total_duration: Duration,
}

/// Execute the apply pipeline.
pub fn apply(cfg: &ApplyConfig) -> Result<ApplyResult, BuildError> {
    let start = Instant::now();

    let parse_options = if cfg.options.safe {
        ParseOptions::safe()
    } else {
        ParseOptions::default()
    };
    let mut plan = parse_recipe_file(cfg.recipe_path, &parse_options)?;

    if let Some(template) = plan.deb_version() {
        let substituted = substitute_time(template, plan.format(), cfg.now);
        plan.set_deb_version(substituted);
    }

    let old = match &cfg.options.if_changed_from {
        Some(path) => load_manifest(path)?,
        None => None,
    };

    let status = resolve_and_compare(&mut plan, old.as_ref(), cfg.provider)?;
    if !status.is_changed() {
        tracing::info!(recipe = %cfg.recipe_path.display(), "Unchanged");
        return Ok(ApplyResult {
            status,
            plan,
            tree: None,
            steps: 0,
            total_duration: start.elapsed(),
        });
    }

    // Without metadata the deb-version is final now; fail before building.
    if cfg.packaging.is_none() {
        finish_without_metadata(&mut plan)?;
    }

    let (build_dir, published) = match &cfg.options.publish_to {
        Some(publish_to) => {
            let dir = staging::staging_dir(publish_to, &plan)?;
            staging::prepare(&dir)?;
            (dir, Some(publish_to.clone()))
        }
        None => (cfg.target.to_path_buf(), None),
    };

    let steps = build_tree(&plan, &build_dir, cfg.provider, cfg.runner)?;

    if let Some(metadata) = cfg.packaging {
        finish_deb_version(&mut plan, metadata, &build_dir)?;
    }

    write_manifest(&cfg.options.manifest_in(&build_dir), &plan)?;

    let tree = match published {
        Some(publish_to) => {
            staging::publish(&build_dir, &publish_to)?;
            publish_to
        }
        None => build_dir,
    };

    if let Some(path) = &cfg.options.manifest_path {
        write_manifest(path, &plan)?;
    }

    let total_duration = start.elapsed();
    tracing::info!(
        tree = %tree.display(),
        steps,
        seconds = total_duration.as_secs_f64(),
        "build complete"
    );
    Ok(ApplyResult {
        status,
        plan,
        tree: Some(tree),
        steps,
        total_duration,
    })
}

/// Materialize a resolved plan at `target`, depth-first in document
/// order. Returns the number of steps performed. Stops at the first
/// failure; whatever was already built stays on disk.
pub fn build_tree(
    plan: &RecipePlan,
    target: &Path,
    provider: &dyn VcsProvider,
    runner: &dyn CommandRunner,
) -> Result<usize, BuildError> {
    let mut ctx = BuildCtx {
        provider,
        runner,
        steps: 0,
    };
    ctx.checkout(plan.root(), target)?;
    Ok(ctx.steps)
}

struct BuildCtx<'a> {
    provider: &'a dyn VcsProvider,
    runner: &'a dyn CommandRunner,
    steps: usize,
}

impl BuildCtx<'_> {
    /// Check out (or update) `branch` at `target`, then apply its children.
    fn checkout(&mut self, branch: &BranchNode, target: &Path) -> Result<(), BuildError> {
        let revision = resolved(branch)?;
        tracing::info!(branch = branch.label(), revision, target = %target.display(), "checkout");
        let conflicts = self
            .provider
            .checkout_or_update(&branch.location, revision, target)
            .map_err(|source| vcs_error(branch, "checkout", source))?;
        if !conflicts.is_empty() {
            return Err(BuildError::Conflict {
                branch: branch.label().to_string(),
                target: target.to_path_buf(),
                conflicts,
            });
        }
        self.steps += 1;
        self.apply_children(branch, target)
    }

    fn apply_children(&mut self, branch: &BranchNode, target: &Path) -> Result<(), BuildError> {
        for instruction in &branch.children {
            match instruction {
                Instruction::Merge { branch: child } => {
                    self.merge(child, target)?;
                    self.apply_children(child, target)?;
                }
                Instruction::Nest {
                    branch: child,
                    target_dir,
                } => self.checkout(child, &target.join(target_dir))?,
                Instruction::NestPart {
                    branch: child,
                    source_subpath,
                    target_dir,
                } => {
                    let part_target = target.join(target_dir);
                    self.export(child, source_subpath, &part_target)?;
                    self.apply_children(child, &part_target)?;
                }
                Instruction::Run { command } => self.run(command, target)?,
            }
        }
        Ok(())
    }

    fn merge(&mut self, branch: &BranchNode, target: &Path) -> Result<(), BuildError> {
        let revision = resolved(branch)?;
        tracing::info!(branch = branch.label(), revision, target = %target.display(), "merge");
        let outcome = self
            .provider
            .merge(&branch.location, revision, target)
            .map_err(|source| vcs_error(branch, "merge", source))?;
        match outcome {
            MergeOutcome::Conflicted(conflicts) => {
                return Err(BuildError::Conflict {
                    branch: branch.label().to_string(),
                    target: target.to_path_buf(),
                    conflicts,
                })
            }
            MergeOutcome::UpToDate => {
                tracing::debug!(branch = branch.label(), "nothing to merge");
            }
            MergeOutcome::Merged => {
                let message = format!("Merge {}", branch.location);
                self.provider
                    .commit(target, &message)
                    .map_err(|source| vcs_error(branch, "commit", source))?;
            }
        }
        self.steps += 1;
        Ok(())
    }

    fn export(&mut self, branch: &BranchNode, subpath: &str, target: &Path) -> Result<(), BuildError> {
        let revision = resolved(branch)?;
        tracing::info!(
            branch = branch.label(),
            revision,
            subpath,
            target = %target.display(),
            "nest-part"
        );
        self.provider
            .export_subpath(&branch.location, revision, subpath, target)
            .map_err(|source| vcs_error(branch, "export", source))?;
        self.steps += 1;
        Ok(())
    }

    fn run(&mut self, command: &str, cwd: &Path) -> Result<(), BuildError> {
        tracing::info!(command, cwd = %cwd.display(), "run");
        let out = self.runner.run(command, cwd)?;
        if !out.success() {
            return Err(BuildError::Command {
                command: command.to_string(),
                exit_code: out.exit_code,
                output: out.output.trim().to_string(),
            });
        }
        self.steps += 1;
        Ok(())
    }
}

fn resolved(branch: &BranchNode) -> Result<&str, BuildError> {
    branch.resolved_revision().ok_or_else(|| BuildError::Unresolved {
        branch: branch.label().to_string(),
    })
}

fn vcs_error(branch: &BranchNode, operation: &'static str, source: crate::core::error::VcsError) -> BuildError {
    BuildError::Vcs {
        branch: branch.label().to_string(),
        operation,
        source,
    }
}
