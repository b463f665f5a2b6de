//! Event relay between watch nodes and subscribers
//!
//! Every node hands its events to a `Relay`. The root relays into the
//! `Emitter` that consumers subscribe to; every other node relays into its
//! parent, which re-checks its own state before passing the event further
//! up. An event therefore only reaches subscribers if every node on the
//! path to the root is still alive.

use crate::event::WatchEvent;
use crate::node::WatchNode;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Stream of events for one subscriber
pub type EventStream = mpsc::UnboundedReceiver<WatchEvent>;

/// Fan-out of events to any number of subscribers
///
/// Events are published in one total order to every subscriber.
/// Subscribers that hung up are pruned on the next publish.
#[derive(Clone, Default)]
pub struct Emitter {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<WatchEvent>>>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber; it only sees events published from now on
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: WatchEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Where a node sends its events
pub(crate) enum Relay {
    /// Root node: straight to subscribers
    Root(Emitter),
    /// Child node: non-owning link to the parent that created it
    Parent(Weak<WatchNode>),
}

impl Relay {
    pub(crate) fn forward(&self, event: WatchEvent) {
        match self {
            Relay::Root(emitter) => emitter.publish(event),
            Relay::Parent(parent) => {
                if let Some(parent) = parent.upgrade() {
                    parent.emit(event);
                }
            }
        }
    }
}
