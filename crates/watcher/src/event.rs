//! Consumer-facing events

use crate::error::WatchError;
use std::fmt;
use std::sync::Arc;

/// Raw kind that produced a `Change` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The entry was replaced in place (rename over an existing name)
    Rename,
    /// The entry's content or metadata changed
    Change,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Rename => f.write_str("rename"),
            ChangeKind::Change => f.write_str("change"),
        }
    }
}

/// Event emitted by a watcher
///
/// `path_offset` is the `/`-separated path from the root watcher's folder to
/// the folder of the node that emitted the event; empty for the root.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// The node finished its initial listing and queued all initial adds
    Ready { path_offset: String },
    /// An entry newly exists
    Add { name: String, path_offset: String },
    /// An entry ceased to exist
    Remove { name: String, path_offset: String },
    /// An existing entry changed
    Change {
        kind: ChangeKind,
        name: String,
        path_offset: String,
    },
    /// A listing failure or an OS subscription fault
    Error(Arc<WatchError>),
}

impl WatchEvent {
    pub fn path_offset(&self) -> Option<&str> {
        match self {
            WatchEvent::Ready { path_offset }
            | WatchEvent::Add { path_offset, .. }
            | WatchEvent::Remove { path_offset, .. }
            | WatchEvent::Change { path_offset, .. } => Some(path_offset),
            WatchEvent::Error(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            WatchEvent::Add { name, .. }
            | WatchEvent::Remove { name, .. }
            | WatchEvent::Change { name, .. } => Some(name),
            WatchEvent::Ready { .. } | WatchEvent::Error(_) => None,
        }
    }

    /// Path of the affected entry relative to the root folder
    pub fn relative_path(&self) -> Option<String> {
        Some(join_offset(self.path_offset()?, self.name()?))
    }

    /// Whether this is the `ready` of the root node
    pub fn is_root_ready(&self) -> bool {
        matches!(self, WatchEvent::Ready { path_offset } if path_offset.is_empty())
    }
}

/// Join a path offset and an entry name with `/`
pub fn join_offset(offset: &str, name: &str) -> String {
    if offset.is_empty() {
        name.to_owned()
    } else {
        format!("{offset}/{name}")
    }
}
