//! Type manager.
//!
//! The `OptionManager` keeps the registry of custom types, flattens their
//! inheritance ("extends") graph in one pass and builds the immutable type
//! tree of a schema.

mod document;
mod registry;
mod schema;


// Re-export public API
pub use document::SchemaDocument;
pub use registry::OptionManager;
pub use schema::{Schema, SchemaDef};
