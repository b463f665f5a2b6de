//! Error types for the watch engine.
//!
//! Misuse of the API (watching twice, commanding an aborted watcher, bad
//! options) comes back from the call. Environmental faults (a directory
//! that cannot be listed, an OS subscription that failed) are delivered as
//! `WatchEvent::Error` instead, since they happen asynchronously.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for watch engine results.
pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Error, Debug)]
pub enum WatchError {
    /// Stat or listing of a watched directory failed.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The watched path exists but is not a directory.
    #[error("not a directory: '{0}'")]
    NotADirectory(PathBuf),

    /// The OS subscription could not be opened.
    #[error("failed to subscribe to '{path}': {source}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The OS subscription reported a fault after watching started.
    /// The watch should be treated as unreliable from here on.
    #[error("watch subscription error: {0}")]
    Notify(#[from] notify::Error),

    /// `watch` was called on a watcher that was already started.
    #[error("watcher is already watching a folder")]
    AlreadyWatching,

    /// A command was issued before `watch`.
    #[error("watcher is not watching a folder")]
    NotWatching,

    /// The watcher was aborted; it cannot be restarted.
    #[error("watcher has been aborted")]
    Aborted,

    /// `watch` was called outside a tokio runtime.
    #[error("watching requires a running tokio runtime")]
    NoRuntime,

    #[error("invalid watch options: {0}")]
    InvalidOptions(String),

    /// An ignore pattern or ignore file could not be parsed.
    #[error("invalid ignore pattern: {0}")]
    Ignore(#[from] ignore::Error),
}

impl WatchError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a caller mistake rather than a filesystem fault.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::AlreadyWatching
                | Self::NotWatching
                | Self::Aborted
                | Self::NoRuntime
                | Self::InvalidOptions(_)
        )
    }
}
