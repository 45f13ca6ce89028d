//! Engine settings for optree.
//!
//! `Config` tunes how a [`Tree`](crate::tree::Tree) reacts to locked writes,
//! unknown link targets and reentrant watchers. It is loaded from YAML;
//! unknown fields are ignored and every field has a default.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::Config;
pub use types::{LinkTargetPolicy, LockedWritePolicy};
