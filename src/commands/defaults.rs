//! Implementation of the `optree defaults` command.

use super::load_tree;
use crate::cli::{DefaultsArgs, OutputFormat};
use optree::config::Config;
use optree::error::{OptreeError, Result};
use optree::value::Value;

/// Execute the `optree defaults` command.
pub fn cmd_defaults(args: DefaultsArgs, config: Config) -> Result<()> {
    let (_, tree) = load_tree(&args.schema, config)?;

    let value = match args.path.as_deref() {
        Some(path) => tree.get(path)?,
        None => tree.snapshot()?,
    };

    print!("{}", render(&value, args.format)?);
    Ok(())
}

/// Render a value in the requested format, newline-terminated.
fn render(value: &Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| OptreeError::UserError(format!("failed to render JSON: {}", e))),
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| OptreeError::UserError(format!("failed to render YAML: {}", e))),
    }
}
