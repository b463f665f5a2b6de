//! OS subscription layer
//!
//! Wraps `notify` so the rest of the engine only ever sees `RawEvent`s for
//! the direct children of one directory. Platform quirks are handled in the
//! per-OS modules and never leak into reconciliation.

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
use macos as os;

#[cfg(target_os = "linux")]
use linux as os;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod os {
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
            EventKind::Modify(_) => Some(RawKind::Change),
            EventKind::Any | EventKind::Other => Some(RawKind::Rename),
        }
    }
}

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use smallvec::SmallVec;
use std::path::{Component, Path, PathBuf};
use tracing::{trace, warn};

/// Kind of raw notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    /// A name appeared, disappeared or changed identity. The direction is
    /// resolved later from presence on disk, never from the OS report.
    Rename,
    /// Content or metadata of an entry changed
    Change,
    /// The OS dropped events; the directory must be re-listed
    Rescan,
}

/// Raw notification for one direct child of a watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawKind,
    /// Child name; empty for `Rescan`
    pub name: String,
}

impl RawEvent {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            kind: RawKind::Rename,
            name: name.into(),
        }
    }

    pub fn change(name: impl Into<String>) -> Self {
        Self {
            kind: RawKind::Change,
            name: name.into(),
        }
    }

    pub fn rescan() -> Self {
        Self {
            kind: RawKind::Rescan,
            name: String::new(),
        }
    }

    /// Fold a later notification for the same name into this one
    ///
    /// A burst that contains any identity change stays an identity change,
    /// whatever content notification trails it.
    pub fn absorb(&mut self, newer: RawEvent) {
        if self.kind == RawKind::Change || newer.kind != RawKind::Change {
            self.kind = newer.kind;
        }
        self.name = newer.name;
    }
}

/// What a subscription hands to its handler
#[derive(Debug)]
pub enum Notice {
    Event(RawEvent),
    Error(notify::Error),
}

/// Open OS subscription on one directory (non-recursive)
///
/// Dropping the subscription closes it.
pub struct Subscription {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl Subscription {
    /// Subscribe to `dir`
    ///
    /// `handler` runs on the notifier's own thread, so it must not block.
    pub fn open<F>(dir: &Path, handler: F) -> Result<Self, notify::Error>
    where
        F: Fn(Notice) + Send + 'static,
    {
        let root = WatchRoot::new(dir);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for raw in translate(&root, &event) {
                    handler(Notice::Event(raw));
                }
            }
            Err(err) => handler(Notice::Error(err)),
        })?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        trace!("Subscribed to {}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// The watched directory as given and as the OS may report it
pub(crate) struct WatchRoot {
    given: PathBuf,
    normalized: Option<PathBuf>,
}

impl WatchRoot {
    pub(crate) fn new(dir: &Path) -> Self {
        let normalized = os::normalize_root(dir).filter(|n| n != dir);
        Self {
            given: dir.to_path_buf(),
            normalized,
        }
    }

    /// Name of `path` if it is a direct child of the root
    fn child_name(&self, path: &Path) -> Option<String> {
        let rest = path
            .strip_prefix(&self.given)
            .ok()
            .or_else(|| path.strip_prefix(self.normalized.as_ref()?).ok())?;

        let mut components = rest.components();
        let name = match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => name,
            _ => return None,
        };

        match name.to_str() {
            Some(name) => Some(name.to_owned()),
            None => {
                warn!("Skipping non UTF-8 name in {}", self.given.display());
                None
            }
        }
    }
}

/// Turn one notify event into raw events for direct children
///
/// Events about the directory itself or about deeper paths are dropped.
pub(crate) fn translate(root: &WatchRoot, event: &Event) -> SmallVec<[RawEvent; 2]> {
    let mut raw = SmallVec::new();

    if event.need_rescan() {
        trace!("Rescan requested for {}", root.given.display());
        raw.push(RawEvent::rescan());
        return raw;
    }

    let Some(kind) = os::classify(&event.kind) else {
        return raw;
    };

    for path in &event.paths {
        if let Some(name) = root.child_name(path) {
            if !raw.iter().any(|r: &RawEvent| r.name == name) {
                raw.push(RawEvent { kind, name });
            }
        }
    }

    raw
}
