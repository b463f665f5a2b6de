//! Event and listing output

use dirwatch::{EntryKind, EntryMeta, WatchEvent};
use owo_colors::OwoColorize;
use serde::Serialize;

/// JSON shape of one event
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_offset: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> EventRecord<'a> {
    pub fn new(event: &'a WatchEvent) -> Self {
        let (name, kind, error) = match event {
            WatchEvent::Ready { .. } => ("ready", None, None),
            WatchEvent::Add { .. } => ("add", None, None),
            WatchEvent::Remove { .. } => ("remove", None, None),
            WatchEvent::Change { kind, .. } => ("change", Some(kind.to_string()), None),
            WatchEvent::Error(err) => ("error", None, Some(err.to_string())),
        };

        Self {
            event: name,
            path: event.relative_path(),
            path_offset: event.path_offset(),
            kind,
            error,
        }
    }
}

/// One line describing `event`
pub fn format_event(event: &WatchEvent, json: bool) -> String {
    if json {
        return serde_json::to_string(&EventRecord::new(event))
            .unwrap_or_else(|err| format!(r#"{{"event":"error","error":"{err}"}}"#));
    }

    match event {
        WatchEvent::Ready { path_offset } if path_offset.is_empty() => {
            format!("{} {}", "ready".bold(), ".".dimmed())
        }
        WatchEvent::Ready { path_offset } => format!("{} {}", "ready".bold(), path_offset.dimmed()),
        WatchEvent::Add { .. } => format!("{} {}", "+".green(), display_path(event).green()),
        WatchEvent::Remove { .. } => format!("{} {}", "-".red(), display_path(event).red()),
        WatchEvent::Change { kind, .. } => format!(
            "{} {} {}",
            "~".yellow(),
            display_path(event).yellow(),
            format!("({kind})").dimmed()
        ),
        WatchEvent::Error(err) => format!("{} {}", "error:".red().bold(), err),
    }
}

fn display_path(event: &WatchEvent) -> String {
    event.relative_path().unwrap_or_default()
}

/// JSON shape of one listed entry
#[derive(Debug, Serialize)]
pub struct EntryRecord<'a> {
    pub name: &'a str,
    #[serde(flatten)]
    pub meta: &'a EntryMeta,
}

/// One line describing a listed entry
pub fn format_entry(name: &str, meta: &EntryMeta, json: bool) -> String {
    if json {
        let record = EntryRecord { name, meta };
        return serde_json::to_string(&record)
            .unwrap_or_else(|err| format!(r#"{{"name":"{name}","error":"{err}"}}"#));
    }

    match meta.kind {
        EntryKind::Dir => format!("{:>10}  {}/", "-".dimmed(), name.blue().bold()),
        EntryKind::File => format!("{:>10}  {}", meta.size, name),
        EntryKind::Other => format!("{:>10}  {}", "?".dimmed(), name.magenta()),
    }
}
