//! Watch nodes
//!
//! One node per watched directory. A node owns the snapshot of its
//! directory, the OS subscription on it, a debouncer, a mutation queue and
//! (when its recursion budget allows) one child node per sub-directory.
//! Nodes form a tree mirroring the filesystem; a parent exclusively owns
//! its children and a child only keeps a weak link back to its parent.
//!
//! Lifecycle: `Created` -> `Watching` -> `Aborted`. A node becomes
//! `Watching` once its initial listing succeeded and stays `Created` for
//! good if it failed. `Aborted` is terminal.
//!
//! Lock order: a node's lifecycle lock may be held while taking its own
//! snapshot/children locks and while taking the lifecycle locks of its
//! ancestors (event relay). Nothing ever takes a descendant's lock while
//! holding a lifecycle lock.

use crate::debounce::Debouncer;
use crate::error::{Result, WatchError};
use crate::event::{join_offset, WatchEvent};
use crate::filter::EntryFilter;
use crate::options::RecursionBudget;
use crate::platform::{Notice, RawEvent, RawKind, Subscription};
use crate::queue::MutationQueue;
use crate::reconcile::list_names;
use crate::relay::{Emitter, Relay};
use ahash::AHashMap;
use dirwatch_core::{EntryMeta, Snapshot};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Initial listing not completed (or failed)
    Created,
    /// Initial listing completed; reconciling raw events
    Watching,
    /// Terminal: no further mutations or events
    Aborted,
}

/// Point-in-time description of one node of a watch tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub path_offset: String,
    pub folder: PathBuf,
    pub recursion_budget: RecursionBudget,
    pub state: NodeState,
    pub entries: usize,
}

/// Settings shared by every node of one tree
pub(crate) struct TreeContext {
    pub debounce: Duration,
    pub filter: EntryFilter,
}

pub(crate) struct Lifecycle {
    state: NodeState,
    /// `watch` has been called
    started: bool,
}

pub(crate) struct WatchNode {
    pub(crate) root_path: PathBuf,
    pub(crate) path_offset: String,
    pub(crate) budget: RecursionBudget,
    pub(crate) ctx: Arc<TreeContext>,
    pub(crate) relay: Relay,
    lifecycle: Mutex<Lifecycle>,
    pub(crate) snapshot: RwLock<Snapshot>,
    pub(crate) children: Mutex<AHashMap<String, Arc<WatchNode>>>,
    subscription: Mutex<Option<Subscription>>,
    debouncer: Mutex<Option<Debouncer<String, RawEvent>>>,
    queue: MutationQueue,
}

impl WatchNode {
    fn new(
        root_path: PathBuf,
        path_offset: String,
        budget: RecursionBudget,
        ctx: Arc<TreeContext>,
        relay: Relay,
    ) -> Arc<Self> {
        Arc::new(Self {
            root_path,
            path_offset,
            budget,
            ctx,
            relay,
            lifecycle: Mutex::new(Lifecycle {
                state: NodeState::Created,
                started: false,
            }),
            snapshot: RwLock::new(Snapshot::new()),
            children: Mutex::new(AHashMap::new()),
            subscription: Mutex::new(None),
            debouncer: Mutex::new(None),
            queue: MutationQueue::spawn(),
        })
    }

    /// Create the root node of a tree; must run inside a tokio runtime
    pub(crate) fn root(
        root_path: PathBuf,
        budget: RecursionBudget,
        ctx: Arc<TreeContext>,
        emitter: Emitter,
    ) -> Arc<Self> {
        Self::new(root_path, String::new(), budget, ctx, Relay::Root(emitter))
    }

    /// Create the node for sub-directory `name` and open its subscription
    ///
    /// The child is not started; the caller starts it once its own `add`
    /// for `name` has been emitted, so that event precedes anything the
    /// child reports.
    pub(crate) fn spawn_child(self: &Arc<Self>, name: &str) -> Option<Arc<Self>> {
        let child = Self::new(
            self.root_path.join(name),
            join_offset(&self.path_offset, name),
            self.budget.child(),
            self.ctx.clone(),
            Relay::Parent(Arc::downgrade(self)),
        );

        match child.subscribe() {
            Ok(()) => {
                debug!(
                    "Spawned child node '{}' (budget {})",
                    child.path_offset,
                    child.budget.get()
                );
                Some(child)
            }
            Err(source) => {
                self.fail(WatchError::Subscribe {
                    path: child.root_path.clone(),
                    source,
                });
                child.abort();
                None
            }
        }
    }

    /// Start watching: verify the folder, subscribe, list and reconcile
    ///
    /// Callable once. The work itself runs on the node's queue.
    pub(crate) fn watch(self: &Arc<Self>) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == NodeState::Aborted {
                return Err(WatchError::Aborted);
            }
            if lifecycle.started {
                return Err(WatchError::AlreadyWatching);
            }
            lifecycle.started = true;
        }

        let node = self.clone();
        self.queue.push(async move { node.initial_listing().await });
        Ok(())
    }

    async fn initial_listing(self: Arc<Self>) {
        match tokio::fs::metadata(&self.root_path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return self.fail(WatchError::NotADirectory(self.root_path.clone())),
            Err(source) => return self.fail(WatchError::io(&self.root_path, source)),
        }

        if let Err(source) = self.subscribe() {
            return self.fail(WatchError::Subscribe {
                path: self.root_path.clone(),
                source,
            });
        }

        let names = match list_names(&self.root_path).await {
            Ok(names) => names,
            Err(source) => {
                self.unsubscribe();
                return self.fail(WatchError::io(&self.root_path, source));
            }
        };

        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != NodeState::Created {
                trace!("Listing of {} finished after abort", self.root_path.display());
                return;
            }
            lifecycle.state = NodeState::Watching;
        }
        debug!(
            "Watching {} ({} entries, budget {})",
            self.root_path.display(),
            names.len(),
            self.budget.get()
        );

        for name in names {
            let node = self.clone();
            self.queue.push(async move { node.add_entry(name).await });
        }

        let node = self.clone();
        self.queue.push(async move {
            trace!("Ready: '{}'", node.path_offset);
            node.emit(WatchEvent::Ready {
                path_offset: node.path_offset.clone(),
            });
        });
    }

    /// Open the OS subscription and its debouncer (no-op when open)
    fn subscribe(self: &Arc<Self>) -> std::result::Result<(), notify::Error> {
        let mut subscription = self.subscription.lock();
        // Checked under the subscription lock so a racing abort cannot
        // miss a subscription opened here
        if subscription.is_some() || self.state() == NodeState::Aborted {
            return Ok(());
        }

        let weak = Arc::downgrade(self);
        let debouncer =
            Debouncer::with_merge(self.ctx.debounce, RawEvent::absorb, move |raw: RawEvent| {
                if let Some(node) = weak.upgrade() {
                    node.dispatch(raw);
                }
            });

        let input = debouncer.sender();
        let weak = Arc::downgrade(self);
        let opened = Subscription::open(&self.root_path, move |notice| match notice {
            // Lost events are never coalesced away
            Notice::Event(raw) if raw.kind == RawKind::Rescan => {
                if let Some(node) = weak.upgrade() {
                    node.dispatch(raw);
                }
            }
            Notice::Event(raw) => {
                trace!("Raw {:?} '{}'", raw.kind, raw.name);
                input.push(raw.name.clone(), raw);
            }
            Notice::Error(err) => {
                if let Some(node) = weak.upgrade() {
                    node.fail(WatchError::Notify(err));
                }
            }
        })?;

        *subscription = Some(opened);
        *self.debouncer.lock() = Some(debouncer);
        Ok(())
    }

    pub(crate) fn unsubscribe(&self) {
        // Same lock as `subscribe`, so both halves are seen together
        let mut subscription = self.subscription.lock();
        if let Some(debouncer) = self.debouncer.lock().take() {
            debouncer.shutdown();
        }
        subscription.take();
    }

    /// Queue reconciliation of one debounced raw event
    pub(crate) fn dispatch(self: &Arc<Self>, raw: RawEvent) {
        let node = self.clone();
        if !self.queue.push(async move { node.apply_raw(raw).await }) {
            trace!("Dropping raw event for aborted node '{}'", self.path_offset);
        }
    }

    /// Queue a re-listing of this node and, after it, of every descendant
    pub(crate) fn rescan(self: &Arc<Self>) -> bool {
        let node = self.clone();
        self.queue.push(async move { node.rescan_listing().await })
    }

    /// Stop watching this node and every descendant
    ///
    /// Idempotent. Pending queue tasks are discarded and a task that is
    /// in flight can no longer mutate the snapshot or emit.
    pub(crate) fn abort(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == NodeState::Aborted {
                return;
            }
            lifecycle.state = NodeState::Aborted;
        }

        self.queue.drain();
        self.unsubscribe();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.into_values() {
            child.abort();
        }
        debug!("Aborted node '{}' ({})", self.path_offset, self.root_path.display());
    }

    /// Emit an event from this node
    ///
    /// Dropped if this node or any ancestor has been aborted.
    pub(crate) fn emit(&self, event: WatchEvent) {
        if let Some(_live) = self.live() {
            self.relay.forward(event);
        }
    }

    /// Lifecycle guard if the node is not aborted
    ///
    /// Mutations that must not happen after abort run while holding it.
    pub(crate) fn live(&self) -> Option<MutexGuard<'_, Lifecycle>> {
        let lifecycle = self.lifecycle.lock();
        (lifecycle.state != NodeState::Aborted).then_some(lifecycle)
    }

    /// Report an environmental fault
    pub(crate) fn fail(&self, err: WatchError) {
        warn!("Watch error at '{}': {}", self.path_offset, err);
        self.emit(WatchEvent::Error(Arc::new(err)));
    }

    pub(crate) fn state(&self) -> NodeState {
        self.lifecycle.lock().state
    }

    pub(crate) fn folder(&self) -> &Path {
        &self.root_path
    }

    pub(crate) fn filenames(&self) -> Vec<String> {
        self.snapshot.read().filenames().to_vec()
    }

    pub(crate) fn files(&self) -> AHashMap<String, EntryMeta> {
        self.snapshot.read().files()
    }

    /// Entries in insertion order
    pub(crate) fn entries(&self) -> Vec<(String, EntryMeta)> {
        self.snapshot
            .read()
            .iter()
            .map(|(name, meta)| (name.to_owned(), meta.clone()))
            .collect()
    }

    /// Descendant at `path_offset` (`""` is this node)
    pub(crate) fn find(self: &Arc<Self>, path_offset: &str) -> Option<Arc<Self>> {
        let mut node = self.clone();
        for segment in path_offset.split('/').filter(|s| !s.is_empty()) {
            let next = node.children.lock().get(segment).cloned()?;
            node = next;
        }
        Some(node)
    }

    /// Describe this node and its descendants, depth-first
    pub(crate) fn collect_info(&self, out: &mut Vec<NodeInfo>) {
        out.push(NodeInfo {
            path_offset: self.path_offset.clone(),
            folder: self.root_path.clone(),
            recursion_budget: self.budget,
            state: self.state(),
            entries: self.snapshot.read().len(),
        });

        let mut children: Vec<_> = self.children.lock().values().cloned().collect();
        children.sort_by(|a, b| a.path_offset.cmp(&b.path_offset));
        for child in children {
            child.collect_info(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::EventStream;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn root_node(dir: &Path, depth: i32) -> (Arc<WatchNode>, EventStream) {
        let emitter = Emitter::new();
        let events = emitter.subscribe();
        let ctx = Arc::new(TreeContext {
            debounce: Duration::from_millis(25),
            filter: EntryFilter::allow_all(),
        });
        let node = WatchNode::root(dir.to_path_buf(), RecursionBudget::new(depth), ctx, emitter);
        (node, events)
    }

    async fn next(events: &mut EventStream) -> WatchEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
    }

    async fn wait_ready(events: &mut EventStream, offset: &str) -> Vec<WatchEvent> {
        let mut seen = Vec::new();
        loop {
            let event = next(events).await;
            if matches!(&event, WatchEvent::Ready { path_offset } if path_offset == offset) {
                return seen;
            }
            seen.push(event);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_initial_listing_then_ready() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.txt"), b"b").unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"a").unwrap();

        let (node, mut events) = root_node(temp_dir.path(), 0);
        node.watch().unwrap();

        let before_ready = wait_ready(&mut events, "").await;
        let names: Vec<_> = before_ready.iter().filter_map(|e| e.name()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(node.state(), NodeState::Watching);
        assert_eq!(node.filenames(), ["a.txt", "b.txt"]);
        assert_eq!(node.files()["a.txt"].size, 1);

        node.abort();
    }

    #[tokio::test]
    async fn test_second_watch_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (node, _events) = root_node(temp_dir.path(), 0);

        node.watch().unwrap();
        assert!(matches!(node.watch(), Err(WatchError::AlreadyWatching)));

        node.abort();
        assert!(matches!(node.watch(), Err(WatchError::Aborted)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_folder_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let (node, mut events) = root_node(&temp_dir.path().join("missing"), 0);
        node.watch().unwrap();

        match next(&mut events).await {
            WatchEvent::Error(err) => assert!(matches!(*err, WatchError::Io { .. })),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(node.state(), NodeState::Created);
    }

    #[tokio::test]
    async fn test_listing_that_finishes_after_abort_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(temp_dir.path().join(format!("f{i}.txt")), b"x").unwrap();
        }
        let (node, mut events) = root_node(temp_dir.path(), 0);

        // Suspend the listing on its first filesystem call, then abort
        let mut listing = Box::pin(node.clone().initial_listing());
        let _ = futures::poll!(listing.as_mut());
        node.abort();
        listing.await;

        assert_eq!(node.state(), NodeState::Aborted);
        assert!(node.filenames().is_empty());
        let quiet = timeout(Duration::from_millis(200), events.recv()).await;
        assert!(quiet.is_err(), "unexpected event after abort: {:?}", quiet);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_raw_events_after_abort_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let (node, mut events) = root_node(temp_dir.path(), 0);
        node.watch().unwrap();
        wait_ready(&mut events, "").await;

        node.abort();
        fs::write(temp_dir.path().join("late.txt"), b"x").unwrap();
        node.dispatch(RawEvent::rename("late.txt"));
        node.dispatch(RawEvent::change("late.txt"));

        let quiet = timeout(Duration::from_millis(200), events.recv()).await;
        assert!(quiet.is_err(), "unexpected event after abort: {:?}", quiet);
        assert!(node.filenames().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abort_is_idempotent_and_recursive() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sub/deeper")).unwrap();

        let (node, mut events) = root_node(temp_dir.path(), -1);
        node.watch().unwrap();
        wait_ready(&mut events, "sub/deeper").await;

        let mut info = Vec::new();
        node.collect_info(&mut info);
        assert_eq!(info.len(), 3);

        let sub = node.children.lock().get("sub").cloned().unwrap();
        node.abort();
        node.abort();

        assert_eq!(node.state(), NodeState::Aborted);
        assert_eq!(sub.state(), NodeState::Aborted);
        assert!(node.children.lock().is_empty());
    }
}
