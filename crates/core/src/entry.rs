//! Entry metadata recorded for each child of a watched directory

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::time::SystemTime;

/// Type of directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory (candidate for a child watch node)
    Dir,
    /// Anything else (sockets, fifos, devices)
    Other,
}

impl EntryKind {
    /// Classify a file type
    pub fn from_file_type(file_type: std::fs::FileType) -> Self {
        if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// Last-known metadata of one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Kind of entry
    pub kind: EntryKind,
    /// Size in bytes as reported by the stat
    pub size: u64,
    /// Last modification time, when the platform reports one
    #[serde(with = "epoch_ms")]
    pub modified: Option<SystemTime>,
}

impl EntryMeta {
    /// Create metadata for a file
    pub fn file(size: u64) -> Self {
        Self {
            kind: EntryKind::File,
            size,
            modified: None,
        }
    }

    /// Create metadata for a directory
    pub fn dir() -> Self {
        Self {
            kind: EntryKind::Dir,
            size: 0,
            modified: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

impl From<&Metadata> for EntryMeta {
    fn from(meta: &Metadata) -> Self {
        Self {
            kind: EntryKind::from_file_type(meta.file_type()),
            size: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

/// Modified time as milliseconds since the UNIX epoch
mod epoch_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(time: &Option<SystemTime>, s: S) -> Result<S::Ok, S::Error> {
        (*time)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SystemTime>, D::Error> {
        let ms: Option<u64> = Option::deserialize(d)?;
        Ok(ms.map(|ms| UNIX_EPOCH + Duration::from_millis(ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_meta_from_file_and_dir() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let meta = EntryMeta::from(&fs::metadata(&file).unwrap());
        assert_eq!(meta.kind, EntryKind::File);
        assert_eq!(meta.size, 5);
        assert!(meta.modified.is_some());

        let meta = EntryMeta::from(&fs::metadata(temp_dir.path().join("sub")).unwrap());
        assert!(meta.is_dir());
    }

    #[test]
    fn test_modified_serializes_as_millis() {
        let meta = EntryMeta {
            kind: EntryKind::File,
            size: 3,
            modified: Some(std::time::UNIX_EPOCH + std::time::Duration::from_millis(1500)),
        };

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"kind":"file","size":3,"modified":1500}"#);

        let back: EntryMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
