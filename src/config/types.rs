//! Configuration enums and default value functions.

use serde::{Deserialize, Serialize};

/// Behaviour of writes to locked options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockedWritePolicy {
    /// Log a warning and ignore the write (default).
    #[default]
    Warn,
    /// Ignore the write silently.
    Ignore,
    /// Fail with an access error.
    Reject,
}

impl LockedWritePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Ignore => "ignore",
            Self::Reject => "reject",
        }
    }

    /// Parse a policy from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "warn" => Some(Self::Warn),
            "ignore" => Some(Self::Ignore),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Behaviour of declared links whose target is not in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkTargetPolicy {
    /// Fail with a schema definition error (default).
    #[default]
    Reject,
    /// Drop the link with a warning.
    Ignore,
}

impl LinkTargetPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Ignore => "ignore",
        }
    }

    /// Parse a policy from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "reject" => Some(Self::Reject),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

// Default value functions for serde
pub(crate) fn default_max_dispatch_depth() -> u32 {
    64
}
