//! Exit code constants for the optree binary.
//!
//! - 0: Success
//! - 1: User error (bad args, unreadable input)
//! - 2: Schema definition failure
//! - 3: Value validation failure
//! - 4: Access failure
//! - 5: Structural failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or unreadable input files.
pub const USER_ERROR: i32 = 1;

/// The schema could not be turned into a type tree.
pub const SCHEMA_FAILURE: i32 = 2;

/// A value was rejected by its option type.
pub const VALUE_FAILURE: i32 = 3;

/// Unknown option path or write to a non-writable option.
pub const ACCESS_FAILURE: i32 = 4;

/// Duplicate collection key or use of a detached option.
pub const STRUCTURAL_FAILURE: i32 = 5;
