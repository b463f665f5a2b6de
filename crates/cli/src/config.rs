//! Configuration for `dw watch`
//!
//! Settings come from an optional TOML file and from command-line flags.
//! Flags win over file values; the merged watch options are validated
//! before anything is started.
//!
//! ```toml
//! [watch]
//! recursion_depth = -1
//! debounce_ms = 25
//! ignore = ["target/", "*.swp"]
//! rescan_interval_secs = 300
//!
//! [output]
//! json = false
//! ```

use anyhow::{Context, Result};
use dirwatch::WatchOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub watch: WatchOptions,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// One JSON object per event instead of colored text
    pub json: bool,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub recursion_depth: Option<i32>,
    pub debounce_ms: Option<u64>,
    /// Appended to the file's patterns
    pub ignore: Vec<String>,
    pub rescan_interval_secs: Option<u64>,
    pub json: Option<bool>,
}

/// Effective settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub options: WatchOptions,
    pub json: bool,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn merge(self, overrides: Overrides) -> Settings {
        let mut options = self.watch;

        if let Some(depth) = overrides.recursion_depth {
            options.recursion_depth = depth;
        }
        if let Some(debounce_ms) = overrides.debounce_ms {
            options.debounce_ms = debounce_ms;
        }
        if let Some(secs) = overrides.rescan_interval_secs {
            options.rescan_interval_secs = Some(secs);
        }
        options.ignore.extend(overrides.ignore);

        Settings {
            options,
            json: overrides.json.unwrap_or(self.output.json),
        }
    }
}

/// Load the config file if any, apply flags and validate
pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<Settings> {
    let file = match path {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let settings = file.merge(overrides);
    settings
        .options
        .validate()
        .context("Invalid watch configuration")?;
    Ok(settings)
}

/// Example configuration with every key set
pub fn example_config() -> String {
    r#"# dw configuration

[watch]
# Sub-directory depth: 0 = this folder only, -1 = unlimited
recursion_depth = -1

# Quiet period used to coalesce bursts of notifications (milliseconds)
debounce_ms = 25

# Gitignore-syntax patterns, relative to the watched folder
ignore = ["target/", ".git/", "*.swp"]

# Optional gitignore-syntax file, relative to the watched folder
# ignore_file = ".dwignore"

# Re-list the whole tree periodically to catch missed changes (seconds)
# rescan_interval_secs = 300

[output]
# One JSON object per line instead of colored text
json = false
"#
    .to_string()
}
