//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Dispatch settings
    // =========================================================================
    /// Maximum nesting of change notifications (watchers that write).
    #[serde(default = "default_max_dispatch_depth")]
    pub max_dispatch_depth: u32,

    // =========================================================================
    // Write settings
    // =========================================================================
    /// What a write to a locked option does.
    #[serde(default)]
    pub locked_writes: LockedWritePolicy,

    // =========================================================================
    // Link settings
    // =========================================================================
    /// What a declared link to a non-existent option does.
    #[serde(default)]
    pub unknown_link_targets: LinkTargetPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_dispatch_depth: default_max_dispatch_depth(),
            locked_writes: LockedWritePolicy::default(),
            unknown_link_targets: LinkTargetPolicy::default(),
        }
    }
}
