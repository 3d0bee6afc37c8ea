//! RB-003: Plan model — branch nodes, instructions, and the recipe root.
//!
//! A plan is a tree: every [`BranchNode`] owns an ordered list of
//! [`Instruction`]s, and the branch-bearing instructions own child nodes.
//! The root additionally carries the format version and the optional
//! `deb-version` template.

use super::format::{FormatVersion, InstructionKind};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

// ============================================================================
// Branch nodes
// ============================================================================

/// One source location plus the instructions applied on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchNode {
    /// Recipe-unique identifier; `None` for the base branch.
    pub name: Option<String>,

    /// Where the branch lives (URL or path, opaque to the core).
    pub location: String,

    /// User-supplied revision selector, e.g. `tag:1.0` or `revid:abc`.
    pub revision_spec: Option<String>,

    /// Concrete revision chosen during resolution.
    resolved_revision: Option<String>,

    /// Instructions in document order.
    pub children: Vec<Instruction>,
}

impl BranchNode {
    pub fn new(name: Option<&str>, location: &str, revision_spec: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            location: location.to_string(),
            revision_spec: revision_spec.map(str::to_string),
            resolved_revision: None,
            children: Vec::new(),
        }
    }

    /// A nameless base branch.
    pub fn base(location: &str) -> Self {
        Self::new(None, location, None)
    }

    /// A named child branch.
    pub fn named(name: &str, location: &str) -> Self {
        Self::new(Some(name), location, None)
    }

    pub fn with_revision_spec(mut self, spec: &str) -> Self {
        self.revision_spec = Some(spec.to_string());
        self
    }

    /// Builder form of a resolved node (used for stored manifests and tests).
    pub fn with_resolved_revision(mut self, revision: &str) -> Self {
        self.resolved_revision = Some(revision.to_string());
        self
    }

    pub fn resolved_revision(&self) -> Option<&str> {
        self.resolved_revision.as_deref()
    }

    /// Record the resolved revision. A node resolves once; later calls are
    /// ignored and return false.
    pub(crate) fn set_resolved_revision(&mut self, revision: String) -> bool {
        if self.resolved_revision.is_some() {
            return false;
        }
        self.resolved_revision = Some(revision);
        true
    }

    /// Human label for diagnostics: the name, or the location for the base.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.location)
    }

    pub fn merge(&mut self, branch: BranchNode) {
        self.children.push(Instruction::Merge { branch });
    }

    pub fn nest(&mut self, target_dir: &str, branch: BranchNode) {
        self.children.push(Instruction::Nest {
            branch,
            target_dir: target_dir.to_string(),
        });
    }

    pub fn nest_part(&mut self, source_subpath: &str, target_dir: &str, branch: BranchNode) {
        self.children.push(Instruction::NestPart {
            branch,
            source_subpath: source_subpath.to_string(),
            target_dir: target_dir.to_string(),
        });
    }

    pub fn run(&mut self, command: &str) {
        self.children.push(Instruction::Run {
            command: command.to_string(),
        });
    }

    /// Child branches in document order (skips `run`).
    pub fn child_branches(&self) -> impl Iterator<Item = &BranchNode> {
        self.children.iter().filter_map(Instruction::branch)
    }

    /// This node and every descendant, depth-first pre-order.
    pub fn walk(&self) -> Vec<&BranchNode> {
        let mut out = vec![self];
        for child in self.child_branches() {
            out.extend(child.walk());
        }
        out
    }

    /// Follow child-instruction indices down from this node.
    pub(crate) fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut BranchNode> {
        let mut node = self;
        for index in path {
            node = node.children.get_mut(*index)?.branch_mut()?;
        }
        Some(node)
    }

    pub(crate) fn descendant(&self, path: &[usize]) -> Option<&BranchNode> {
        path.iter()
            .try_fold(self, |node, index| node.children.get(*index)?.branch())
    }

    /// Structural equality ignoring revisions: names, locations, and the
    /// kind, order and paths of every instruction, recursively.
    pub fn shape_equals(&self, other: &BranchNode) -> bool {
        self.name == other.name
            && self.location == other.location
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.shape_equals(b))
    }
}

// ============================================================================
// Instructions
// ============================================================================

/// One child position of a branch node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "instruction", rename_all = "kebab-case")]
pub enum Instruction {
    /// Merge another branch into the current tree.
    Merge { branch: BranchNode },

    /// Full checkout of `branch` at `target_dir`.
    Nest { branch: BranchNode, target_dir: String },

    /// Copy only `source_subpath` of `branch` to `target_dir`.
    NestPart {
        branch: BranchNode,
        source_subpath: String,
        target_dir: String,
    },

    /// Shell command run in the current tree.
    Run { command: String },
}

impl Instruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Self::Merge { .. } => InstructionKind::Merge,
            Self::Nest { .. } => InstructionKind::Nest,
            Self::NestPart { .. } => InstructionKind::NestPart,
            Self::Run { .. } => InstructionKind::Run,
        }
    }

    pub fn branch(&self) -> Option<&BranchNode> {
        match self {
            Self::Merge { branch } | Self::Nest { branch, .. } | Self::NestPart { branch, .. } => {
                Some(branch)
            }
            Self::Run { .. } => None,
        }
    }

    pub fn branch_mut(&mut self) -> Option<&mut BranchNode> {
        match self {
            Self::Merge { branch } | Self::Nest { branch, .. } | Self::NestPart { branch, .. } => {
                Some(branch)
            }
            Self::Run { .. } => None,
        }
    }

    /// The directory this instruction occupies, if it nests.
    pub fn target_dir(&self) -> Option<&str> {
        match self {
            Self::Nest { target_dir, .. } | Self::NestPart { target_dir, .. } => Some(target_dir),
            Self::Merge { .. } | Self::Run { .. } => None,
        }
    }

    pub fn shape_equals(&self, other: &Instruction) -> bool {
        match (self, other) {
            (Self::Merge { branch: a }, Self::Merge { branch: b }) => a.shape_equals(b),
            (
                Self::Nest {
                    branch: a,
                    target_dir: da,
                },
                Self::Nest {
                    branch: b,
                    target_dir: db,
                },
            ) => da == db && a.shape_equals(b),
            (
                Self::NestPart {
                    branch: a,
                    source_subpath: sa,
                    target_dir: da,
                },
                Self::NestPart {
                    branch: b,
                    source_subpath: sb,
                    target_dir: db,
                },
            ) => sa == sb && da == db && a.shape_equals(b),
            (Self::Run { command: a }, Self::Run { command: b }) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// Recipe root
// ============================================================================

/// A parsed recipe: the base branch tree plus header data.
#[derive(Debug, Clone, Serialize)]
pub struct RecipePlan {
    format: FormatVersion,

    /// Current `deb-version` template, possibly partially substituted.
    deb_version: Option<String>,

    root: BranchNode,

    /// Branch name → child-index path from the root. Derived, never owning.
    #[serde(skip)]
    names: IndexMap<String, Vec<usize>>,
}

impl RecipePlan {
    /// Wrap a branch tree. Names are expected to be unique (the parser
    /// enforces this); on a clash the first occurrence wins the index.
    pub fn new(root: BranchNode, deb_version: Option<String>, format: FormatVersion) -> Self {
        let mut names = IndexMap::new();
        index_names(&root, &mut Vec::new(), &mut names);
        Self {
            format,
            deb_version,
            root,
            names,
        }
    }

    pub fn format(&self) -> FormatVersion {
        self.format
    }

    pub fn deb_version(&self) -> Option<&str> {
        self.deb_version.as_deref()
    }

    /// Replace the template with a substituted one.
    pub fn set_deb_version(&mut self, template: String) {
        self.deb_version = Some(template);
    }

    pub fn root(&self) -> &BranchNode {
        &self.root
    }

    /// Mutable access for revision resolution. The tree shape must not be
    /// changed through this reference.
    pub(crate) fn root_mut(&mut self) -> &mut BranchNode {
        &mut self.root
    }

    /// Every branch name in document order.
    pub fn branch_names(&self) -> impl Iterator<Item = &str> + Clone {
        self.names.keys().map(String::as_str)
    }

    /// Look up a named branch through the name index.
    pub fn find_branch(&self, name: &str) -> Option<&BranchNode> {
        let path = self.names.get(name)?;
        self.root.descendant(path)
    }

    /// Where `name`'s content lands, relative to the root tree. Merged
    /// branches share their parent's directory.
    pub fn tree_dir_of(&self, name: &str) -> Option<PathBuf> {
        let path = self.names.get(name)?;
        let mut node = &self.root;
        let mut dir = PathBuf::new();
        for index in path {
            let instruction = node.children.get(*index)?;
            if let Some(target) = instruction.target_dir() {
                dir.push(target);
            }
            node = instruction.branch()?;
        }
        Some(dir)
    }

    pub fn shape_equals(&self, other: &RecipePlan) -> bool {
        self.root.shape_equals(&other.root)
    }

    /// True once every branch node carries a resolved revision.
    pub fn is_resolved(&self) -> bool {
        self.root
            .walk()
            .iter()
            .all(|node| node.resolved_revision().is_some())
    }
}

fn index_names(node: &BranchNode, path: &mut Vec<usize>, names: &mut IndexMap<String, Vec<usize>>) {
    if let Some(ref name) = node.name {
        names.entry(name.clone()).or_insert_with(|| path.clone());
    }
    for (index, child) in node.children.iter().enumerate() {
        if let Some(branch) = child.branch() {
            path.push(index);
            index_names(branch, path, names);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::V0_4;

    fn sample_tree() -> BranchNode {
        let mut root = BranchNode::base("http://x/trunk");
        root.merge(BranchNode::named("fixes", "http://x/fixes"));
        let mut art = BranchNode::named("art", "http://x/art");
        art.merge(BranchNode::named("art-fixes", "http://x/art-fixes"));
        root.nest("images", art);
        root.run("autoreconf -i");
        root.nest_part(
            "debian",
            "debian",
            BranchNode::named("pkg", "http://x/pkg").with_revision_spec("tag:1.0"),
        );
        root
    }

    #[test]
    fn test_rb003_walk_is_preorder() {
        let root = sample_tree();
        let labels: Vec<&str> = root.walk().iter().map(|n| n.label()).collect();
        assert_eq!(
            labels,
            vec!["http://x/trunk", "fixes", "art", "art-fixes", "pkg"]
        );
    }

    #[test]
    fn test_rb003_name_index_finds_nested() {
        let plan = RecipePlan::new(sample_tree(), Some("1-{revno}".into()), V0_4);
        assert_eq!(
            plan.branch_names().collect::<Vec<_>>(),
            vec!["fixes", "art", "art-fixes", "pkg"]
        );
        assert_eq!(plan.find_branch("art-fixes").unwrap().location, "http://x/art-fixes");
        assert_eq!(plan.find_branch("pkg").unwrap().revision_spec.as_deref(), Some("tag:1.0"));
        assert!(plan.find_branch("missing").is_none());
    }

    #[test]
    fn test_rb003_tree_dir_follows_nests() {
        let plan = RecipePlan::new(sample_tree(), None, V0_4);
        assert_eq!(plan.tree_dir_of("fixes"), Some(PathBuf::new()));
        assert_eq!(plan.tree_dir_of("art"), Some(PathBuf::from("images")));
        assert_eq!(plan.tree_dir_of("art-fixes"), Some(PathBuf::from("images")));
        assert_eq!(plan.tree_dir_of("pkg"), Some(PathBuf::from("debian")));
        assert_eq!(plan.tree_dir_of("missing"), None);
    }

    #[test]
    fn test_rb003_shape_ignores_revisions() {
        let a = sample_tree();
        let b = sample_tree().with_resolved_revision("rev-1").with_revision_spec("revid:rev-1");
        assert!(a.shape_equals(&b));
    }

    #[test]
    fn test_rb003_shape_detects_target_change() {
        let a = sample_tree();
        let mut b = sample_tree();
        if let Instruction::Nest { target_dir, .. } = &mut b.children[1] {
            *target_dir = "pictures".to_string();
        }
        assert!(!a.shape_equals(&b));
    }

    #[test]
    fn test_rb003_shape_detects_kind_change() {
        let mut a = BranchNode::base("u");
        a.merge(BranchNode::named("x", "v"));
        let mut b = BranchNode::base("u");
        b.nest("x", BranchNode::named("x", "v"));
        assert!(!a.shape_equals(&b));
    }

    #[test]
    fn test_rb003_shape_detects_nested_name_change() {
        let a = sample_tree();
        let mut b = sample_tree();
        if let Some(art) = b.descendant_mut(&[1]) {
            art.children[0] = Instruction::Merge {
                branch: BranchNode::named("other", "http://x/art-fixes"),
            };
        }
        assert!(!a.shape_equals(&b));
    }

    #[test]
    fn test_rb003_resolved_revision_is_write_once() {
        let mut node = BranchNode::base("u");
        assert!(node.set_resolved_revision("r1".into()));
        assert!(!node.set_resolved_revision("r2".into()));
        assert_eq!(node.resolved_revision(), Some("r1"));
    }

    #[test]
    fn test_rb003_is_resolved() {
        let mut root = BranchNode::base("u").with_resolved_revision("r");
        root.merge(BranchNode::named("a", "v"));
        let plan = RecipePlan::new(root.clone(), None, V0_4);
        assert!(!plan.is_resolved());
        root.children[0].branch_mut().unwrap().set_resolved_revision("s".into());
        assert!(RecipePlan::new(root, None, V0_4).is_resolved());
    }
}
