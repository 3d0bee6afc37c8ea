//! RB-018: CLI subcommands — validate, format, tokens, compare.
//!
//! The CLI only inspects recipes. Building needs a VCS provider, which
//! callers plug in through the library.

use crate::core::config::{load_options, validate_options};
use crate::core::format::available_placeholders;
use crate::core::manifest::{load_manifest, serialize};
use crate::core::parser::{parse_recipe_file, ParseOptions};
use crate::core::types::RecipePlan;
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a recipe and report its branches
    Validate {
        /// Path to the recipe
        recipe: PathBuf,

        /// Reject `run` instructions
        #[arg(long)]
        safe: bool,

        /// Build options file (TOML) to validate alongside
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Print a recipe in canonical form
    Format {
        /// Path to the recipe
        recipe: PathBuf,

        /// Print the parsed plan as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// List the substitution tokens a recipe's deb-version may use
    Tokens {
        /// Path to the recipe
        recipe: PathBuf,
    },

    /// Compare a recipe's shape with a previous build manifest
    Compare {
        /// Path to the recipe
        recipe: PathBuf,

        /// Manifest of the previous build
        manifest: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Validate {
            recipe,
            safe,
            options,
        } => cmd_validate(&recipe, safe, options.as_deref()),
        Commands::Format { recipe, json } => cmd_format(&recipe, json),
        Commands::Tokens { recipe } => cmd_tokens(&recipe),
        Commands::Compare { recipe, manifest } => cmd_compare(&recipe, &manifest),
    }
}

fn load(recipe: &Path, safe: bool) -> Result<RecipePlan, String> {
    let options = if safe {
        ParseOptions::safe()
    } else {
        ParseOptions::default()
    };
    parse_recipe_file(recipe, &options).map_err(|e| e.to_string())
}

fn cmd_validate(recipe: &Path, safe: bool, options: Option<&Path>) -> Result<(), String> {
    let plan = load(recipe, safe)?;

    if let Some(path) = options {
        let options = load_options(path).map_err(|e| e.to_string())?;
        let errors = validate_options(&options);
        if !errors.is_empty() {
            for e in &errors {
                eprintln!("  ERROR: {}", e.message);
            }
            return Err(format!("{} option error(s)", errors.len()));
        }
    }

    println!(
        "OK: {} (format {}, {} branches)",
        recipe.display(),
        plan.format(),
        plan.root().walk().len()
    );
    Ok(())
}

fn cmd_format(recipe: &Path, json: bool) -> Result<(), String> {
    let plan = load(recipe, false)?;
    if json {
        let out = serde_json::to_string_pretty(&plan).map_err(|e| format!("JSON error: {}", e))?;
        println!("{}", out);
    } else {
        print!("{}", serialize(&plan));
    }
    Ok(())
}

fn cmd_tokens(recipe: &Path) -> Result<(), String> {
    let plan = load(recipe, false)?;
    for token in available_placeholders(&plan.format(), plan.branch_names()) {
        println!("{}", token);
    }
    Ok(())
}

fn cmd_compare(recipe: &Path, manifest: &Path) -> Result<(), String> {
    let plan = load(recipe, false)?;
    match load_manifest(manifest).map_err(|e| e.to_string())? {
        None => println!("No previous manifest at {}: first build", manifest.display()),
        Some(old) if plan.shape_equals(&old) => println!("Same shape as {}", manifest.display()),
        Some(_) => println!("Shape changed since {}", manifest.display()),
    }
    Ok(())
}
