//! Recipe Builder — assemble composite source trees from declarative recipes.
//!
//! A recipe names a base branch plus merges, nested branches, partial
//! nests and shell commands. This crate parses recipes, resolves them to
//! exact revisions, decides whether anything changed since the last
//! build, and drives the build through pluggable VCS, command and
//! packaging collaborators.

pub mod cli;
pub mod core;
pub mod packaging;
pub mod transport;
pub mod vcs;
