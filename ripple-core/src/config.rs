//! Runtime configuration.
//!
//! Each thread's runtime starts with [`RuntimeConfig::default`]. A different
//! configuration can be installed with [`crate::reactive::Runtime::configure`],
//! typically after loading it from JSON.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scheduler::TickPriority;

/// Bound on how many times one subscriber may be re-queued during a flush.
pub const DEFAULT_MAX_UPDATE_COUNT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runaway-cycle bound for the scheduler.
    pub max_update_count: usize,

    /// Priority used for scheduler flushes outside `with_macro_task`.
    pub default_priority: TickPriority,

    /// Suppress warnings (errors are still reported).
    pub silent: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_update_count: DEFAULT_MAX_UPDATE_COUNT,
            default_priority: TickPriority::Microtask,
            silent: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}
