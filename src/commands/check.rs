//! Implementation of the `optree check` command.

use super::load_tree;
use crate::cli::CheckArgs;
use optree::config::Config;
use optree::error::Result;

/// Execute the `optree check` command.
///
/// Builds the schema and a tree from it, then prints a one-line summary.
/// Any schema error aborts with the matching exit code.
pub fn cmd_check(args: CheckArgs, config: Config) -> Result<()> {
    let (schema, tree) = load_tree(&args.schema, config)?;

    // The snapshot reads every default and resolves every link once
    tree.snapshot()?;

    println!(
        "{}: ok ({} root option(s), {} type node(s), {} option(s))",
        args.schema.display(),
        schema.root().len(),
        schema.type_count(),
        tree.option_count()
    );
    Ok(())
}
