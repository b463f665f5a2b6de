//! One-shot listing through a watcher

use crate::output::format_entry;
use anyhow::{bail, Result};
use dirwatch::{NodeState, WatchEvent, WatchOptions, Watcher};
use owo_colors::OwoColorize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// How long sub-folders get to finish their initial listing
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(dir: &Path, depth: i32, json: bool) -> Result<()> {
    let (watcher, mut events) = Watcher::open(dir, WatchOptions::recursive(depth))?;

    let mut ready = HashSet::new();
    loop {
        match events.recv().await {
            Some(WatchEvent::Ready { path_offset }) => {
                let root = path_offset.is_empty();
                ready.insert(path_offset);
                if root {
                    break;
                }
            }
            Some(WatchEvent::Error(err)) if watcher.state() == NodeState::Created => {
                bail!("Cannot list {}: {}", dir.display(), err);
            }
            Some(_) => {}
            None => bail!("Watcher stopped before {} was listed", dir.display()),
        }
    }

    // Sub-folders list concurrently with the root
    let all_ready = async {
        loop {
            let pending = watcher
                .child_offsets()
                .into_iter()
                .any(|offset| !ready.contains(&offset));
            if !pending {
                break;
            }
            match events.recv().await {
                Some(WatchEvent::Ready { path_offset }) => {
                    ready.insert(path_offset);
                }
                Some(_) => {}
                None => break,
            }
        }
    };
    if timeout(SETTLE_TIMEOUT, all_ready).await.is_err() {
        warn!("Some sub-folders did not finish listing; output is partial");
    }

    for node in watcher.nodes() {
        let Some(entries) = watcher.entries(&node.path_offset) else {
            continue;
        };

        if !node.path_offset.is_empty() && !json {
            println!();
            println!("{}", format!("{}/", node.path_offset).bold());
        }
        for (name, meta) in &entries {
            let name = if json {
                dirwatch::event::join_offset(&node.path_offset, name)
            } else {
                name.clone()
            };
            println!("{}", format_entry(&name, meta, json));
        }
    }

    watcher.abort();
    Ok(())
}
