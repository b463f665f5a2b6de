//! Snapshot data model for dirwatch
//!
//! This crate provides:
//! - Entry metadata (kind, size, modified time)
//! - The per-directory snapshot store (ordered name -> metadata)
//! - Diff-based reconciliation of a snapshot against a fresh listing

pub mod entry;
pub mod snapshot;

// Re-exports
pub use entry::{EntryKind, EntryMeta};
pub use snapshot::{Snapshot, SnapshotDiff};
