//! CLI argument parsing for optree.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// optree: inspect hierarchical option schemas.
///
/// A schema document is a YAML (or JSON) file with two members:
/// - `types`: custom option types, which may extend each other
/// - `options`: the root schema
#[derive(Parser, Debug)]
#[command(name = "optree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Engine settings file (YAML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for optree.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a schema document and report problems.
    ///
    /// Registers the custom types, builds the type tree and assembles
    /// a runtime tree so that links and defaults are checked too.
    Check(CheckArgs),

    /// Print the default values of a schema.
    ///
    /// Prints the snapshot of a freshly assembled tree, or of one option
    /// with `--path`.
    Defaults(DefaultsArgs),

    /// List the type tree of a schema.
    ///
    /// Prints one line per type node with its kind and flags.
    Types(TypesArgs),
}

/// Arguments for the `check` command.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Schema document to check.
    pub schema: PathBuf,
}

/// Arguments for the `defaults` command.
#[derive(Parser, Debug)]
pub struct DefaultsArgs {
    /// Schema document to read.
    pub schema: PathBuf,

    /// Option path to print (e.g. `server.ports[0]`).
    #[arg(short, long)]
    pub path: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

/// Arguments for the `types` command.
#[derive(Parser, Debug)]
pub struct TypesArgs {
    /// Schema document to read.
    pub schema: PathBuf,
}

/// Output format of printed values.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
