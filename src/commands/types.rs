//! Implementation of the `optree types` command.

use super::load_schema;
use crate::cli::TypesArgs;
use optree::error::Result;
use optree::types::OptionType;

/// Execute the `optree types` command.
///
/// Prints the type tree, one node per line, indented by depth.
pub fn cmd_types(args: TypesArgs) -> Result<()> {
    let (manager, schema) = load_schema(&args.schema)?;

    let custom: Vec<&str> = manager
        .type_names()
        .into_iter()
        .filter(|name| manager.has_custom_type(name))
        .collect();
    if !custom.is_empty() {
        println!("Custom types: {}", custom.join(", "));
        println!();
    }

    schema.walk(&mut |ty| println!("{}", describe(ty)));
    Ok(())
}

/// One line describing a type node.
fn describe(ty: &OptionType) -> String {
    let depth = ty.full_name().matches('.').count();
    let mut flags = Vec::new();
    if !ty.is_writable() {
        flags.push("read-only".to_string());
    }
    if ty.is_nullable() {
        flags.push("nullable".to_string());
    }
    for link in ty.links() {
        flags.push(format!("link {}", link.to_link_string()));
    }

    let mut line = format!(
        "{}{} : {}",
        "  ".repeat(depth),
        ty.full_name(),
        ty.kind()
    );
    if !flags.is_empty() {
        line.push_str(&format!(" [{}]", flags.join(", ")));
    }
    line
}
