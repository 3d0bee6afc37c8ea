//! Core recipe logic — format gates, parsing, manifests, substitution,
//! resolution, change detection and the build pipeline.

pub mod config;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod format;
pub mod manifest;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod staging;
pub mod substitution;
pub mod types;
