//! Entry filtering with gitignore-syntax patterns
//!
//! Patterns come from two optional sources, both relative to the root of
//! the watched tree:
//! 1. `WatchOptions::ignore` (inline patterns)
//! 2. `WatchOptions::ignore_file` (a gitignore-syntax file)
//!
//! An ignored entry is never recorded, produces no events and, if it is a
//! directory, never gets a watch node of its own.

use crate::error::{Result, WatchError};
use crate::options::WatchOptions;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Matcher shared by every node of one watch tree
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// None when no pattern was configured
    matcher: Option<Gitignore>,
}

impl EntryFilter {
    /// Filter that lets everything through
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Build the filter for a tree rooted at `root`
    pub fn from_options(root: &Path, options: &WatchOptions) -> Result<Self> {
        if options.ignore.is_empty() && options.ignore_file.is_none() {
            return Ok(Self::allow_all());
        }

        let mut builder = GitignoreBuilder::new(root);

        if let Some(ignore_file) = &options.ignore_file {
            // Relative ignore files are resolved against the watched folder
            let path = if ignore_file.is_absolute() {
                ignore_file.clone()
            } else {
                root.join(ignore_file)
            };
            if let Some(err) = builder.add(&path) {
                return Err(WatchError::Ignore(err));
            }
        }

        for pattern in &options.ignore {
            builder.add_line(None, pattern)?;
        }

        Ok(Self {
            matcher: Some(builder.build()?),
        })
    }

    /// Check a path relative to the tree root
    pub fn is_ignored(&self, relative: &str, is_dir: bool) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.matched(relative, is_dir).is_ignore(),
            None => false,
        }
    }

    /// Number of configured patterns, whitelists included
    pub fn len(&self) -> usize {
        self.matcher
            .as_ref()
            .map_or(0, |m| (m.num_ignores() + m.num_whitelists()) as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
