//! Recursive directory watching
//!
//! A `Watcher` keeps an in-memory snapshot of a folder's direct entries,
//! optionally of sub-folders down to a recursion depth, and reports every
//! change to it as an ordered stream of events:
//! - `ready` once a folder's initial listing has been queued
//! - `add` / `remove` when an entry starts or stops existing
//! - `change` when an existing entry is modified or replaced
//! - `error` when a listing or the OS subscription fails
//!
//! Raw OS notifications are debounced per entry, serialized per folder and
//! resolved against the filesystem, so consumers see no duplicate adds, no
//! removals of unknown entries and nothing at all after `abort`.

pub mod debounce;
pub mod error;
pub mod event;
pub mod filter;
mod node;
pub mod options;
pub mod platform;
pub mod queue;
mod reconcile;
pub mod relay;

pub use error::{Result, WatchError};
pub use event::{ChangeKind, WatchEvent};
pub use node::{NodeInfo, NodeState};
pub use options::{RecursionBudget, WatchOptions, DEFAULT_DEBOUNCE_MS};
pub use relay::{Emitter, EventStream};

pub use dirwatch_core::{EntryKind, EntryMeta};

use ahash::AHashMap;
use filter::EntryFilter;
use node::{TreeContext, WatchNode};
use parking_lot::Mutex;
use reconcile::PeriodicReconciler;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to the root of a watch tree
///
/// Inert until `watch` is called. Dropping the handle aborts the watch.
pub struct Watcher {
    emitter: Emitter,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    root: Option<Arc<WatchNode>>,
    reconciler: Option<JoinHandle<()>>,
    aborted: bool,
}

impl Watcher {
    pub fn new() -> Self {
        Self {
            emitter: Emitter::new(),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Create a watcher, subscribe to it and start watching `path`
    ///
    /// The stream is attached before watching starts, so it sees every
    /// event including the initial `add`s.
    pub fn open(path: impl AsRef<Path>, options: WatchOptions) -> Result<(Self, EventStream)> {
        let watcher = Self::new();
        let events = watcher.subscribe();
        watcher.watch(path, options)?;
        Ok((watcher, events))
    }

    /// Attach a new event stream; it sees events published from now on
    pub fn subscribe(&self) -> EventStream {
        self.emitter.subscribe()
    }

    /// Start watching `path`
    ///
    /// Callable once per watcher and only inside a tokio runtime. Problems
    /// with the folder itself (missing, not a directory, unreadable) are
    /// reported as an `error` event, not here.
    pub fn watch(&self, path: impl AsRef<Path>, options: WatchOptions) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.aborted {
            return Err(WatchError::Aborted);
        }
        if slot.root.is_some() {
            return Err(WatchError::AlreadyWatching);
        }

        options.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;

        let folder = absolute(path.as_ref())?;
        let filter = EntryFilter::from_options(&folder, &options)?;
        let ctx = Arc::new(TreeContext {
            debounce: options.debounce(),
            filter,
        });

        let root = WatchNode::root(
            folder,
            options.recursion_budget(),
            ctx,
            self.emitter.clone(),
        );
        root.watch()?;

        if let Some(period) = options.rescan_interval() {
            slot.reconciler = Some(PeriodicReconciler::new(&root, period).spawn());
        }

        info!(
            "Watching {} (depth {}, debounce {:?})",
            root.folder().display(),
            options.recursion_depth,
            options.debounce()
        );
        slot.root = Some(root);
        Ok(())
    }

    /// Stop watching, recursively
    ///
    /// Idempotent. No event is delivered once this returns.
    pub fn abort(&self) {
        let (root, reconciler) = {
            let mut slot = self.slot.lock();
            if slot.aborted {
                return;
            }
            slot.aborted = true;
            (slot.root.clone(), slot.reconciler.take())
        };

        if let Some(reconciler) = reconciler {
            reconciler.abort();
        }
        if let Some(root) = root {
            root.abort();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.slot.lock().aborted
    }

    /// Lifecycle state of the root folder
    pub fn state(&self) -> NodeState {
        let slot = self.slot.lock();
        match &slot.root {
            Some(root) => root.state(),
            None if slot.aborted => NodeState::Aborted,
            None => NodeState::Created,
        }
    }

    /// Names of the root folder's entries, in insertion order
    pub fn filenames(&self) -> Vec<String> {
        self.root().map(|root| root.filenames()).unwrap_or_default()
    }

    /// Metadata of the root folder's entries, keyed by name
    pub fn files(&self) -> AHashMap<String, EntryMeta> {
        self.root().map(|root| root.files()).unwrap_or_default()
    }

    /// Absolute path of the watched folder, once `watch` was called
    pub fn folder(&self) -> Option<PathBuf> {
        self.root().map(|root| root.folder().to_path_buf())
    }

    pub fn recursion_depth(&self) -> Option<i32> {
        self.root().map(|root| root.budget.get())
    }

    /// Entries of the watched folder at `path_offset`, in insertion order
    ///
    /// `None` if no node is attached at that offset.
    pub fn entries(&self, path_offset: &str) -> Option<Vec<(String, EntryMeta)>> {
        Some(self.root()?.find(path_offset)?.entries())
    }

    /// Every node of the tree, root first, depth-first by offset
    pub fn nodes(&self) -> Vec<NodeInfo> {
        let mut nodes = Vec::new();
        if let Some(root) = self.root() {
            root.collect_info(&mut nodes);
        }
        nodes
    }

    /// Offsets of the currently attached descendant folders
    pub fn child_offsets(&self) -> Vec<String> {
        self.nodes()
            .into_iter()
            .skip(1)
            .map(|node| node.path_offset)
            .collect()
    }

    /// Re-list every watched folder and reconcile the differences
    pub fn rescan(&self) -> Result<()> {
        let slot = self.slot.lock();
        if slot.aborted {
            return Err(WatchError::Aborted);
        }
        match &slot.root {
            Some(root) => {
                root.rescan();
                Ok(())
            }
            None => Err(WatchError::NotWatching),
        }
    }

    fn root(&self) -> Option<Arc<WatchNode>> {
        self.slot.lock().root.clone()
    }
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.abort();
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| WatchError::io(path, source))?;
    Ok(cwd.join(path))
}
