//! Keyed trailing-edge debouncing
//!
//! Collapses a burst of raw notifications for the same key into one
//! downstream call. By default the most recent notification wins; a merge
//! function can fold the burst instead. The quiet period
//! restarts with every notification for that key. Each watch node owns one
//! debouncer and keys it by child name, so a burst against one file never
//! swallows notifications for its siblings.

use ahash::AHashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Handle to a running debouncer task
pub struct Debouncer<K, T> {
    tx: mpsc::UnboundedSender<(K, T)>,
    task: JoinHandle<()>,
}

impl<K, T> Debouncer<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Send + 'static,
{
    /// Spawn a debouncer on the current tokio runtime
    ///
    /// `fire` is called from the debouncer task once per key after `window`
    /// has passed without a new notification for that key.
    pub fn spawn<F>(window: Duration, fire: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self::with_merge(window, |held: &mut T, newer| *held = newer, fire)
    }

    /// Like `spawn`, folding each new notification into the pending one
    pub fn with_merge<M, F>(window: Duration, merge: M, fire: F) -> Self
    where
        M: FnMut(&mut T, T) + Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(window, rx, merge, fire));
        Self { tx, task }
    }

    /// Sender usable from any thread, including non-runtime threads
    pub fn sender(&self) -> DebounceSender<K, T> {
        DebounceSender {
            tx: self.tx.clone(),
        }
    }

    pub fn push(&self, key: K, item: T) {
        let _ = self.tx.send((key, item));
    }

    /// Stop the debouncer; pending notifications are discarded
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl<K, T> Drop for Debouncer<K, T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Cloneable input side of a `Debouncer`
pub struct DebounceSender<K, T> {
    tx: mpsc::UnboundedSender<(K, T)>,
}

impl<K, T> Clone for DebounceSender<K, T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<K, T> DebounceSender<K, T> {
    /// Returns false once the debouncer has stopped
    pub fn push(&self, key: K, item: T) -> bool {
        self.tx.send((key, item)).is_ok()
    }
}

async fn run<K, T, M, F>(
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<(K, T)>,
    mut merge: M,
    mut fire: F,
) where
    K: Eq + Hash + Clone,
    M: FnMut(&mut T, T),
    F: FnMut(T),
{
    let mut pending: AHashMap<K, (T, Instant)> = AHashMap::new();

    loop {
        let next_deadline = pending.values().map(|(_, deadline)| *deadline).min();

        tokio::select! {
            received = rx.recv() => match received {
                Some((key, item)) => {
                    let deadline = Instant::now() + window;
                    match pending.entry(key) {
                        Entry::Occupied(mut held) => {
                            let held = held.get_mut();
                            merge(&mut held.0, item);
                            held.1 = deadline;
                        }
                        Entry::Vacant(slot) => {
                            slot.insert((item, deadline));
                        }
                    }
                }
                None => break,
            },
            _ = sleep_until_opt(next_deadline) => {
                let now = Instant::now();
                let mut due: Vec<K> = pending
                    .iter()
                    .filter(|(_, (_, deadline))| *deadline <= now)
                    .map(|(key, _)| key.clone())
                    .collect();
                due.sort_by_key(|key| pending.get(key).map(|(_, deadline)| *deadline));

                for key in due {
                    if let Some((item, _)) = pending.remove(&key) {
                        fire(item);
                    }
                }
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
