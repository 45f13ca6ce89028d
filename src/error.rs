//! Error types for optree.
//!
//! Uses thiserror for derive macros. Every message names the offending option
//! by its full dotted path so the caller can act on it.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for optree operations.
///
/// Shape errors surface while a schema is turned into types; value errors
/// surface on writes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptreeError {
    /// Missing required attribute, unresolvable kind, incompatible link target,
    /// or an invalid attribute value.
    #[error("Schema definition error: {0}")]
    SchemaDefinitionError(String),

    /// A value does not fit the type of the option it was written to.
    #[error("Invalid value: {0}")]
    ValueValidationError(String),

    /// Unregistered option path or a write to a non-writable option.
    #[error("Access denied: {0}")]
    AccessError(String),

    /// Duplicate collection key or mutation of a detached option.
    #[error("Structural error: {0}")]
    StructuralError(String),

    /// Bad arguments or unreadable input handed to the binary.
    #[error("{0}")]
    UserError(String),
}

impl OptreeError {
    /// Returns the process exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            OptreeError::SchemaDefinitionError(_) => exit_codes::SCHEMA_FAILURE,
            OptreeError::ValueValidationError(_) => exit_codes::VALUE_FAILURE,
            OptreeError::AccessError(_) => exit_codes::ACCESS_FAILURE,
            OptreeError::StructuralError(_) => exit_codes::STRUCTURAL_FAILURE,
            OptreeError::UserError(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for optree operations.
pub type Result<T> = std::result::Result<T, OptreeError>;
