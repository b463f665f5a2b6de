//! Reconciliation of snapshots against the filesystem
//!
//! Turns raw notifications and directory listings into snapshot mutations
//! and events. Everything here runs on the owning node's mutation queue,
//! so at most one reconciliation step per node is in flight.
//!
//! `PeriodicReconciler` re-lists a whole tree on an interval to catch
//! changes the OS never reported.

use crate::error::WatchError;
use crate::event::{join_offset, ChangeKind, WatchEvent};
use crate::node::{NodeState, WatchNode};
use crate::platform::{RawEvent, RawKind};
use dirwatch_core::{EntryMeta, SnapshotDiff};
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Names of the direct children of `dir`, sorted
pub(crate) async fn list_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => warn!("Skipping non UTF-8 name {:?} in {}", name, dir.display()),
        }
    }

    names.sort();
    Ok(names)
}

impl WatchNode {
    /// Addition protocol
    ///
    /// Stats the entry, spawns a child node for directories the budget
    /// allows, records it and emits `add`. No-op for names already known.
    pub(crate) async fn add_entry(self: &Arc<Self>, name: String) {
        if self.snapshot.read().contains(&name) {
            return;
        }

        let path = self.root_path.join(&name);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => EntryMeta::from(&meta),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("Entry vanished before it could be added: {}", path.display());
                return;
            }
            Err(err) => {
                warn!("Cannot stat {}: {}", path.display(), err);
                return;
            }
        };

        let relative = join_offset(&self.path_offset, &name);
        if self.ctx.filter.is_ignored(&relative, meta.is_dir()) {
            trace!("Ignoring {}", relative);
            return;
        }

        let child = if meta.is_dir() && self.budget.permits_descent() {
            self.spawn_child(&name)
        } else {
            None
        };

        {
            let Some(_live) = self.live() else {
                if let Some(child) = child {
                    child.abort();
                }
                return;
            };

            self.snapshot.write().insert(&name, meta);
            if let Some(child) = &child {
                self.children.lock().insert(name.clone(), child.clone());
            }
            self.relay.forward(WatchEvent::Add {
                name,
                path_offset: self.path_offset.clone(),
            });
        }

        if let Some(child) = child {
            if let Err(err) = child.watch() {
                debug!("Child '{}' not started: {}", child.path_offset, err);
            }
        }
    }

    /// Removal protocol
    ///
    /// Forgets the entry, aborts its child node if any and emits `remove`.
    /// No-op for unknown names.
    pub(crate) fn remove_entry(&self, name: &str) {
        let child = {
            let Some(_live) = self.live() else {
                return;
            };
            if self.snapshot.write().remove(name).is_none() {
                return;
            }
            self.children.lock().remove(name)
        };

        // Silence the subtree before announcing its removal
        if let Some(child) = child {
            child.abort();
        }
        self.emit(WatchEvent::Remove {
            name: name.to_owned(),
            path_offset: self.path_offset.clone(),
        });
    }

    /// Reconcile one debounced raw notification
    pub(crate) async fn apply_raw(self: &Arc<Self>, raw: RawEvent) {
        match raw.kind {
            RawKind::Rescan => self.rescan_listing().await,
            RawKind::Rename => self.resolve_rename(raw.name).await,
            RawKind::Change => {
                if self.snapshot.read().contains(&raw.name) {
                    self.emit(WatchEvent::Change {
                        kind: ChangeKind::Change,
                        name: raw.name,
                        path_offset: self.path_offset.clone(),
                    });
                } else {
                    // Creation can surface as a change only
                    self.add_entry(raw.name).await;
                }
            }
        }
    }

    /// Decide what a rename notification means from presence on disk
    async fn resolve_rename(self: &Arc<Self>, name: String) {
        let previous = self.snapshot.read().get(&name).cloned();
        let Some(previous) = previous else {
            return self.add_entry(name).await;
        };

        let path = self.root_path.join(&name);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => EntryMeta::from(&meta),
            Err(err) if err.kind() == ErrorKind::NotFound => return self.remove_entry(&name),
            Err(err) => {
                warn!("Cannot resolve rename of {}: {}", path.display(), err);
                return;
            }
        };

        // A replaced directory needs a fresh child node on the new inode
        let replaced = meta.kind != previous.kind || self.children.lock().contains_key(&name);
        if replaced {
            self.remove_entry(&name);
            return self.add_entry(name).await;
        }

        let Some(_live) = self.live() else {
            return;
        };
        self.snapshot.write().insert(&name, meta);
        self.relay.forward(WatchEvent::Change {
            kind: ChangeKind::Rename,
            name,
            path_offset: self.path_offset.clone(),
        });
    }

    /// Re-list the directory, apply the difference, then rescan children
    pub(crate) async fn rescan_listing(self: &Arc<Self>) {
        if self.state() != NodeState::Watching {
            return;
        }

        let names = match list_names(&self.root_path).await {
            Ok(names) => names,
            Err(source) => {
                return self.fail(WatchError::io(&self.root_path, source));
            }
        };

        let diff = SnapshotDiff::between(&self.snapshot.read(), &names);
        if !diff.is_empty() {
            debug!(
                "Rescan of '{}' found {} added, {} removed",
                self.path_offset,
                diff.added.len(),
                diff.removed.len()
            );
        }

        for name in &diff.removed {
            self.remove_entry(name);
        }
        for name in diff.added {
            self.add_entry(name).await;
        }

        let children: Vec<_> = self.children.lock().values().cloned().collect();
        for child in children {
            child.rescan();
        }
    }
}

/// Periodic reconciliation of a whole watch tree
///
/// Catches changes the OS never reported (overflow, races with
/// subscription setup). Stops once the tree is aborted or dropped.
pub struct PeriodicReconciler {
    root: Weak<WatchNode>,
    interval: Duration,
}

impl PeriodicReconciler {
    pub(crate) fn new(root: &Arc<WatchNode>, interval: Duration) -> Self {
        Self {
            root: Arc::downgrade(root),
            interval,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // First tick completes immediately
        timer.tick().await;
        info!("Starting periodic reconciliation (interval: {:?})", self.interval);

        loop {
            timer.tick().await;

            let Some(root) = self.root.upgrade() else {
                break;
            };
            if root.state() == NodeState::Aborted {
                break;
            }

            debug!("Periodic reconciliation of {}", root.folder().display());
            root.rescan();
        }

        debug!("Periodic reconciliation stopped");
    }
}
