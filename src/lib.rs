//! optree: hierarchical, strongly-typed configuration option trees.
//!
//! A schema of typed option definitions is compiled by an [`OptionManager`]
//! into an immutable type tree, from which a runtime [`Tree`] of options is
//! assembled. Options validate writes against their type, fall back to
//! defaults and to links pointing at other options, and bubble change
//! notifications up through their ancestors.
//!
//! ```no_run
//! use optree::prelude::*;
//! use serde_json::json;
//!
//! let schema = SchemaDef::new()
//!     .with("retries", OptionDef::new("number").attr("minValue", 0).value(3))
//!     .with("timeout", OptionDef::new("number").link("$retries$"));
//! let schema = OptionManager::new().build_schema(&schema)?;
//! let mut tree = Tree::new(&schema)?;
//!
//! assert_eq!(tree.get("timeout")?, json!(3));
//! tree.set("retries", json!(5))?;
//! assert_eq!(tree.get("timeout")?, json!(5));
//! # Ok::<(), optree::error::OptreeError>(())
//! ```

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod link;
pub mod manager;
pub mod tree;
pub mod types;
pub mod value;

pub use manager::{OptionManager, Schema, SchemaDef, SchemaDocument};
pub use tree::Tree;
pub use types::{Kind, OptionDef, OptionType};

/// Commonly used items.
pub mod prelude {
    pub use crate::config::{Config, LinkTargetPolicy, LockedWritePolicy};
    pub use crate::error::{OptreeError, Result};
    pub use crate::manager::{OptionManager, Schema, SchemaDef, SchemaDocument};
    pub use crate::tree::{
        watcher, Context, Getter, Linkable, Lockable, OptionId, Setter, Target, Tree, WatchEvent,
        Watchable, WatcherId,
    };
    pub use crate::types::{Kind, OptionDef, OptionType};
    pub use crate::value::Value;
}
