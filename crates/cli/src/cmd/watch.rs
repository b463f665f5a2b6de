//! Stream events for a directory until interrupted

use crate::config::Settings;
use crate::output::format_event;
use anyhow::{Context, Result};
use dirwatch::{NodeState, WatchEvent, Watcher};
use owo_colors::OwoColorize;
use std::path::Path;
use tracing::debug;

pub async fn run(dir: &Path, settings: Settings) -> Result<()> {
    let json = settings.json;
    let depth = settings.options.recursion_depth;

    let (watcher, mut events) = Watcher::open(dir, settings.options)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;

    if !json {
        eprintln!(
            "{} {} {}",
            "Watching".bold(),
            dir.display().to_string().cyan(),
            format!("(depth {depth}, Ctrl-C to stop)").dimmed()
        );
    }

    let result = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break Ok(());
                };
                println!("{}", format_event(&event, json));

                // The root folder itself could not be watched
                if let WatchEvent::Error(err) = &event {
                    if watcher.state() == NodeState::Created {
                        break Err(anyhow::anyhow!("Cannot watch {}: {}", dir.display(), err));
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break signal.context("Failed to listen for Ctrl-C");
            }
        }
    };

    watcher.abort();
    result
}
