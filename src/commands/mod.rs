//! Command implementations for optree.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the loading steps they share.

mod check;
mod defaults;
mod types;

use crate::cli::{Cli, Command};
use optree::config::Config;
use optree::error::Result;
use optree::manager::{OptionManager, Schema, SchemaDocument};
use optree::tree::Tree;
use std::path::Path;
use tracing::debug;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. The engine
/// settings named by `--config` are loaded first and shared by every
/// command.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Check(args) => check::cmd_check(args, config),
        Command::Defaults(args) => defaults::cmd_defaults(args, config),
        Command::Types(args) => types::cmd_types(args),
    }
}

// ============================================================================
// Shared loading steps
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading engine settings");
            Config::load(path)
        }
        None => Ok(Config::default()),
    }
}

/// Load a schema document and build its type tree.
pub(crate) fn load_schema(path: &Path) -> Result<(OptionManager, Schema)> {
    debug!(path = %path.display(), "loading schema document");
    let document = SchemaDocument::load(path)?;
    document.build()
}

/// Load a schema document and assemble a runtime tree from it.
pub(crate) fn load_tree(path: &Path, config: Config) -> Result<(Schema, Tree)> {
    let (_, schema) = load_schema(path)?;
    let tree = Tree::with_config(&schema, config)?;
    Ok((schema, tree))
}
