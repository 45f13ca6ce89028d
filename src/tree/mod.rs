//! Runtime option tree.
//!
//! A [`Tree`] is built from a [`Schema`](crate::manager::Schema) and holds
//! one option per schema slot (plus collection items added at runtime).
//! Writes are validated by the option's type, reads fall back through the
//! default and link chain, and changes are dispatched to the option's
//! watchers, its ancestors and the options linked to it.

mod capability;
mod collection;
mod dispatch;
mod graph;
mod hooks;
mod links;
mod model;
mod node;
mod path;
mod state;

#[cfg(test)]
mod tests;

// Re-export public API
pub use capability::{watcher, Linkable, Lockable, Watchable};
pub use hooks::{Getter, GetterFn, Setter, SetterFn, Target, WatchEvent, WatcherFn, WatcherId};
pub use model::Tree;
pub use node::{Context, OptionId};
pub use path::parse_path;
