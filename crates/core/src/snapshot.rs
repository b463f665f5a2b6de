//! Snapshot of one directory level
//!
//! A snapshot is the authoritative mapping of child name -> metadata for a
//! single watched directory. Names keep the order in which they were added,
//! which is the order the corresponding `add` events fired.

use crate::entry::EntryMeta;
use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

/// Ordered name -> metadata store for one directory
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Names in insertion order
    names: Vec<String>,
    /// Mapping from name to last-known metadata
    entries: AHashMap<String, EntryMeta>,
}

impl Snapshot {
    /// Create a new empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry
    ///
    /// Returns false if the name was already present. Its metadata is
    /// refreshed in that case but its position is kept.
    pub fn insert(&mut self, name: &str, meta: EntryMeta) -> bool {
        match self.entries.get_mut(name) {
            Some(existing) => {
                *existing = meta;
                false
            }
            None => {
                self.names.push(name.to_owned());
                self.entries.insert(name.to_owned(), meta);
                true
            }
        }
    }

    /// Forget an entry
    pub fn remove(&mut self, name: &str) -> Option<EntryMeta> {
        let meta = self.entries.remove(name)?;
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            self.names.remove(idx);
        }
        Some(meta)
    }

    pub fn get(&self, name: &str) -> Option<&EntryMeta> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Known names, in the order they were added
    pub fn filenames(&self) -> &[String] {
        &self.names
    }

    /// Copy of the name -> metadata mapping
    pub fn files(&self) -> AHashMap<String, EntryMeta> {
        self.entries.clone()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntryMeta)> {
        self.names
            .iter()
            .filter_map(move |name| self.entries.get(name).map(|meta| (name.as_str(), meta)))
    }
}

/// Difference between a snapshot and a fresh directory listing
///
/// Most reconciliations touch a handful of names, so both sides stay inline
/// until they grow past eight entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Names present in the listing but unknown to the snapshot (listing order)
    pub added: SmallVec<[String; 8]>,
    /// Names known to the snapshot but missing from the listing (snapshot order)
    pub removed: SmallVec<[String; 8]>,
}

impl SnapshotDiff {
    /// Compute the diff between a snapshot and a listing
    ///
    /// Duplicate names in the listing are reported once.
    pub fn between<S: AsRef<str>>(snapshot: &Snapshot, listing: &[S]) -> Self {
        let mut seen: AHashSet<&str> = AHashSet::with_capacity(listing.len());
        let mut added = SmallVec::new();

        for name in listing {
            let name = name.as_ref();
            if seen.insert(name) && !snapshot.contains(name) {
                added.push(name.to_owned());
            }
        }

        let removed = snapshot
            .filenames()
            .iter()
            .filter(|name| !seen.contains(name.as_str()))
            .cloned()
            .collect();

        Self { added, removed }
    }

    /// Check if there are any changes
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
