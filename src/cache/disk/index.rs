//! Durable Index
//!
//! JSON file mapping every persisted key to its bookkeeping record. The
//! whole file is rewritten after each mutation through a temporary file and
//! an atomic rename.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::entry::add_duration;
use crate::cache::Metadata;
use crate::error::Result;

pub const INDEX_FILE: &str = "index";

/// Bookkeeping for one persisted key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Blob length in bytes
    pub size: u64,
    pub ttl_ms: Option<u64>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub access_count: u64,
    /// Whether the blob was written LZ4 compressed
    #[serde(default)]
    pub compressed: bool,
}

impl IndexRecord {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.ttl().map(|ttl| add_duration(self.created_at, ttl))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires| now > expires)
    }
}

// == Disk Index ==
#[derive(Debug)]
pub struct DiskIndex {
    path: PathBuf,
    records: HashMap<String, IndexRecord>,
}

impl DiskIndex {
    /// Loads the index under `root_dir`.
    ///
    /// A missing file yields an empty index. An unreadable one is logged
    /// and also yields an empty index; its blobs become unreachable.
    pub fn load(root_dir: &Path) -> Self {
        let path = root_dir.join(INDEX_FILE);
        let records = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "disk index is corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "disk index unreadable, starting empty");
                HashMap::new()
            }
        };

        Self { path, records }
    }

    /// Rewrites the whole index atomically.
    pub fn save(&self) -> Result<()> {
        let bytes = serde_json::to_vec(&self.records)?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&IndexRecord> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut IndexRecord> {
        self.records.get_mut(key)
    }

    pub fn insert(&mut self, key: String, record: IndexRecord) -> Option<IndexRecord> {
        self.records.insert(key, record)
    }

    pub fn remove(&mut self, key: &str) -> Option<IndexRecord> {
        self.records.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexRecord)> {
        self.records.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    /// Keys whose TTL has elapsed at `now`.
    pub fn expired_keys(&self, now: DateTime<Utc>) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, record)| record.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Sum of recorded blob sizes.
    pub fn total_size(&self) -> u64 {
        self.records.values().map(|record| record.size).sum()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Removes the index file itself.
    pub fn remove_file(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(size: u64, ttl_ms: Option<u64>) -> IndexRecord {
        let now = Utc::now();
        IndexRecord {
            created_at: now,
            last_accessed_at: now,
            size,
            ttl_ms,
            metadata: Metadata::new(),
            access_count: 0,
            compressed: false,
        }
    }

    #[test]
    fn test_index_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = DiskIndex::load(dir.path());
        assert!(index.is_empty());
    }

    #[test]
    fn test_index_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut index = DiskIndex::load(dir.path());
        let rec = record(42, Some(1500));
        index.insert("k".to_string(), rec.clone());
        index.save().unwrap();

        assert!(dir.path().join(INDEX_FILE).exists());
        assert!(!dir.path().join("index.tmp").exists());

        let reloaded = DiskIndex::load(dir.path());
        assert_eq!(reloaded.get("k"), Some(&rec));
        assert_eq!(reloaded.total_size(), 42);
        assert_eq!(reloaded.get("k").unwrap().ttl(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_index_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(INDEX_FILE), b"{not json").unwrap();

        let index = DiskIndex::load(dir.path());
        assert!(index.is_empty());
    }

    #[test]
    fn test_index_expired_keys() {
        let dir = TempDir::new().unwrap();
        let mut index = DiskIndex::load(dir.path());
        index.insert("live".to_string(), record(1, None));
        index.insert("dead".to_string(), record(1, Some(10)));

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(index.expired_keys(later), vec!["dead".to_string()]);
    }
}
