//! macOS (FSEvents) specifics
//!
//! FSEvents reports canonical paths, so a folder watched through a symlink
//! such as `/var` -> `/private/var` gets events under the resolved path.
//! Its flags are coalesced over time: one event may say "created" for a
//! file that was created and removed again, and renames arrive one path at
//! a time without a direction. Both are resolved by checking presence on
//! disk, which is why anything ambiguous is classified as a rename.

use super::RawKind;
use notify::event::ModifyKind;
use notify::EventKind;
use std::path::{Path, PathBuf};

pub fn normalize_root(dir: &Path) -> Option<PathBuf> {
    dir.canonicalize().ok()
}

pub fn classify(kind: &EventKind) -> Option<RawKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) | EventKind::Remove(_) => Some(RawKind::Rename),
        EventKind::Modify(ModifyKind::Name(_)) => Some(RawKind::Rename),
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Metadata(_)) => {
            Some(RawKind::Change)
        }
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(RawKind::Rename),
    }
}
