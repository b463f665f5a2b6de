//! Watch configuration

use crate::error::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Debounce window used when none is configured
pub const DEFAULT_DEBOUNCE_MS: u64 = 25;

/// Remaining levels of sub-directory descent permitted from a node
///
/// `0` stops recursion, `-1` is unlimited, `N > 0` descends N more levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecursionBudget(i32);

impl RecursionBudget {
    pub const NONE: Self = Self(0);
    pub const UNLIMITED: Self = Self(-1);

    pub fn new(depth: i32) -> Self {
        Self(depth)
    }

    pub fn get(self) -> i32 {
        self.0
    }

    /// Whether directories found by a node with this budget get their own node
    pub fn permits_descent(self) -> bool {
        self.0 > 0 || self.0 == -1
    }

    /// Budget handed to a child node
    pub fn child(self) -> Self {
        if self.0 == -1 {
            Self::UNLIMITED
        } else {
            Self(self.0 - 1)
        }
    }
}

impl Default for RecursionBudget {
    fn default() -> Self {
        Self::NONE
    }
}

/// Options accepted by `Watcher::watch`
///
/// All fields have defaults, so a partial TOML table deserializes:
///
/// ```toml
/// recursion_depth = -1
/// debounce_ms = 25
/// ignore = ["*.tmp", ".git/"]
/// rescan_interval_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// How deep to descend into sub-directories (0 = none, -1 = unlimited)
    pub recursion_depth: i32,

    /// Quiet period used to coalesce bursts of raw notifications
    pub debounce_ms: u64,

    /// Gitignore-syntax patterns, relative to the watched folder
    pub ignore: Vec<String>,

    /// Optional gitignore-syntax file with additional patterns
    pub ignore_file: Option<PathBuf>,

    /// Reconcile the whole tree against disk at this interval (disabled when unset)
    pub rescan_interval_secs: Option<u64>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            recursion_depth: 0,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ignore: vec![],
            ignore_file: None,
            rescan_interval_secs: None,
        }
    }
}

impl WatchOptions {
    /// Options with the given recursion depth and defaults otherwise
    pub fn recursive(depth: i32) -> Self {
        Self {
            recursion_depth: depth,
            ..Self::default()
        }
    }

    /// Check option ranges
    pub fn validate(&self) -> Result<()> {
        if self.recursion_depth < -1 {
            return Err(WatchError::InvalidOptions(format!(
                "recursion_depth must be -1 or greater (got {})",
                self.recursion_depth
            )));
        }
        if self.debounce_ms == 0 {
            return Err(WatchError::InvalidOptions(
                "debounce_ms must be greater than 0".to_string(),
            ));
        }
        if self.rescan_interval_secs == Some(0) {
            return Err(WatchError::InvalidOptions(
                "rescan_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn recursion_budget(&self) -> RecursionBudget {
        RecursionBudget::new(self.recursion_depth)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rescan_interval(&self) -> Option<Duration> {
        self.rescan_interval_secs.map(Duration::from_secs)
    }
}
