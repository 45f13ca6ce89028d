//! Option types.
//!
//! An `OptionType` is the immutable description of one schema slot: its kind,
//! constraints, default, links and hooks. Composite kinds (maps and
//! collections) own their child types. Types are built from `OptionDef`
//! definitions once custom-type inheritance has been flattened.

mod build;
mod compat;
mod definition;
mod kind;
mod model;
mod validate;


// Re-export public API
pub use build::TypeResolver;
pub use definition::OptionDef;
pub use kind::Kind;
pub use model::{KindSpec, OptionType, PROTO_NAME};
