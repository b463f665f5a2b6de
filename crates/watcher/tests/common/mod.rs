//! Common utilities for watcher integration tests

#![allow(dead_code)]

use dirwatch::{EventStream, WatchEvent};
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

/// Upper bound for any single expected event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a stream must stay silent to count as settled
pub const QUIET: Duration = Duration::from_millis(400);

pub async fn next_event(events: &mut EventStream) -> WatchEvent {
    timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

/// Collect events up to and including the first one matching `pred`
pub async fn collect_until<F>(events: &mut EventStream, mut pred: F) -> Vec<WatchEvent>
where
    F: FnMut(&WatchEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Collect events up to and including the `ready` of `offset`
pub async fn until_ready(events: &mut EventStream, offset: &str) -> Vec<WatchEvent> {
    collect_until(events, |event| {
        matches!(event, WatchEvent::Ready { path_offset } if path_offset == offset)
    })
    .await
}

/// Collect events until the stream has been silent for `QUIET`
pub async fn settle(events: &mut EventStream) -> Vec<WatchEvent> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) = timeout(QUIET, events.recv()).await {
        seen.push(event);
    }
    seen
}

pub async fn expect_quiet(events: &mut EventStream) {
    let seen = settle(events).await;
    assert!(seen.is_empty(), "expected no events, got {:?}", seen);
}

/// `(kind, relative path)` pairs, ignoring `ready` and `error`
pub fn summarize(events: &[WatchEvent]) -> Vec<(&'static str, String)> {
    events
        .iter()
        .filter_map(|event| {
            let kind = match event {
                WatchEvent::Add { .. } => "add",
                WatchEvent::Remove { .. } => "remove",
                WatchEvent::Change { .. } => "change",
                WatchEvent::Ready { .. } | WatchEvent::Error(_) => return None,
            };
            Some((kind, event.relative_path()?))
        })
        .collect()
}

pub fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
