//! Linux (inotify) specifics
//!
//! inotify reports direct children of the watched directory with exact
//! paths and distinguishes every change class, so classification is a
//! plain mapping. Queue overflow arrives as an `Other` event carrying the
//! rescan flag, which is handled before classification.

use super::RawKind;
use notify::event::ModifyKind;
use notify::EventKind;
use std::path::{Path, PathBuf};

/// inotify reports paths exactly as they were registered
pub fn normalize_root(_dir: &Path) -> Option<PathBuf> {
    None
}

pub fn classify(kind: &EventKind) -> Option<RawKind> {
    match kind {
        // IN_CLOSE_WRITE and friends; the matching IN_MODIFY already fired
        EventKind::Access(_) => None,
        EventKind::Create(_) | EventKind::Remove(_) => Some(RawKind::Rename),
        EventKind::Modify(ModifyKind::Name(_)) => Some(RawKind::Rename),
        EventKind::Modify(_) => Some(RawKind::Change),
        EventKind::Any => Some(RawKind::Rename),
        EventKind::Other => None,
    }
}
