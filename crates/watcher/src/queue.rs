//! Per-node mutation queue
//!
//! All snapshot mutations of a node, and the events they produce, run as
//! tasks on that node's queue. A single worker drains the queue and awaits
//! each task to completion before starting the next, so tasks run one at a
//! time in submission order even when they suspend on I/O.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

type Task = BoxFuture<'static, ()>;

/// Strictly ordered, single-consumer task queue
pub struct MutationQueue {
    tx: mpsc::UnboundedSender<Task>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl MutationQueue {
    /// Create a queue and spawn its worker on the current tokio runtime
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(Self::run(rx));

        Self {
            tx,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        }
    }

    async fn run(mut rx: mpsc::UnboundedReceiver<Task>) {
        while let Some(task) = rx.recv().await {
            task.await;
        }
        trace!("Mutation queue worker finished");
    }

    /// Append a task
    ///
    /// Returns false if the queue has been drained; the task is dropped.
    pub fn push<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(Box::pin(task)).is_ok()
    }

    /// Stop the worker and discard every pending task
    ///
    /// A task that is currently suspended is cancelled at its next await
    /// point. No task is accepted afterwards.
    pub fn drain(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for MutationQueue {
    fn drop(&mut self) {
        self.drain();
    }
}
