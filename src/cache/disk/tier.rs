//! Persistent Tier
//!
//! Disk-backed [`EvictionPolicy`]. Values live in one blob file per key,
//! bookkeeping lives in the durable index, and an in-memory recency tracker
//! over the index keys decides reclamation order. A background task sweeps
//! expired entries on a fixed interval.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::codec;
use super::index::{DiskIndex, IndexRecord};
use crate::cache::policy::{warn_if_over_budget, EvictionPolicy};
use crate::cache::{CacheEntry, CacheStats, CacheValue, LruTracker, SetOptions};
use crate::config::DiskTierConfig;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweep_task;

// == Disk State ==
#[derive(Debug)]
struct DiskState {
    root_dir: PathBuf,
    index: DiskIndex,
    /// Index keys, least recently accessed first
    recency: LruTracker,
    current_size: u64,
    stats: CacheStats,
}

impl DiskState {
    fn blob_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(codec::blob_file_name(key))
    }

    /// Drops the index row and in-memory bookkeeping, keeping the blob.
    fn forget(&mut self, key: &str) -> Option<IndexRecord> {
        let record = self.index.remove(key)?;
        self.recency.remove(key);
        self.current_size = self.current_size.saturating_sub(record.size);
        Some(record)
    }

    /// Drops the index row and deletes the blob file.
    fn discard(&mut self, key: &str) -> Option<IndexRecord> {
        let record = self.forget(key)?;
        remove_blob(&self.blob_path(key));
        Some(record)
    }

    fn reclaim(&mut self, needed: u64) {
        let mut freed = 0;
        while freed < needed {
            let Some(victim) = self.recency.evict_oldest() else {
                break;
            };
            if let Some(record) = self.discard(&victim) {
                freed += record.size;
                self.stats.record_eviction();
                tracing::debug!(key = %victim, size = record.size, "evicted disk entry");
            }
        }
    }

    /// Persists the index, logging instead of failing.
    fn persist(&self) {
        if let Err(e) = self.index.save() {
            tracing::warn!(root_dir = %self.root_dir.display(), error = %e, "failed to persist disk index");
        }
    }
}

fn remove_blob(path: &Path) {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove blob file");
        }
        _ => {}
    }
}

#[derive(Debug)]
struct Shared {
    max_size: u64,
    compression: bool,
    state: Mutex<DiskState>,
    /// Blob reads performed, for promotion instrumentation
    disk_reads: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

// == Persistent Tier ==
/// Shared handle to a disk tier. Clones refer to the same tier.
#[derive(Debug, Clone)]
pub struct PersistentTier {
    shared: Arc<Shared>,
}

/// Non-owning handle held by the sweep task.
#[derive(Debug, Clone)]
pub struct WeakPersistentTier {
    shared: Weak<Shared>,
}

impl WeakPersistentTier {
    pub fn upgrade(&self) -> Option<PersistentTier> {
        self.shared.upgrade().map(|shared| PersistentTier { shared })
    }
}

impl PersistentTier {
    /// Opens (or creates) the tier rooted at `config.root_dir`, reloading
    /// whatever index is already there.
    pub fn open(config: &DiskTierConfig) -> Result<Self> {
        fs::create_dir_all(&config.root_dir)?;

        let index = DiskIndex::load(&config.root_dir);
        let mut by_access: Vec<(&String, &IndexRecord)> = index.iter().collect();
        by_access.sort_by(|a, b| {
            a.1.last_accessed_at
                .cmp(&b.1.last_accessed_at)
                .then_with(|| a.0.cmp(b.0))
        });

        let mut recency = LruTracker::new();
        for (key, _) in by_access {
            recency.touch(key);
        }
        let current_size = index.total_size();

        tracing::info!(
            root_dir = %config.root_dir.display(),
            entries = index.len(),
            current_size,
            compression = config.compression,
            "opened disk tier"
        );

        let state = DiskState {
            root_dir: config.root_dir.clone(),
            index,
            recency,
            current_size,
            stats: CacheStats::new(),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                max_size: config.max_size,
                compression: config.compression,
                state: Mutex::new(state),
                disk_reads: AtomicU64::new(0),
                sweeper: Mutex::new(None),
            }),
        })
    }

    pub fn downgrade(&self) -> WeakPersistentTier {
        WeakPersistentTier {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn root_dir(&self) -> PathBuf {
        self.shared.state.lock().root_dir.clone()
    }

    /// Number of blob files read so far.
    pub fn disk_reads(&self) -> u64 {
        self.shared.disk_reads.load(Ordering::Relaxed)
    }

    // == Sweep ==
    /// Removes every expired entry (file and index row). Returns the count.
    pub fn sweep_expired(&self) -> usize {
        let mut state = self.shared.state.lock();
        let expired = state.index.expired_keys(Utc::now());
        for key in &expired {
            if state.discard(key).is_some() {
                state.stats.record_eviction();
            }
        }
        if !expired.is_empty() {
            state.persist();
        }
        expired.len()
    }

    /// Starts the periodic sweep on the current tokio runtime, replacing
    /// any sweeper already running.
    pub fn start_sweeper(&self, interval: Duration) {
        if interval.is_zero() {
            tracing::warn!("sweep interval is zero, disk sweeper not started");
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::debug!("no tokio runtime, disk sweeper not started");
            return;
        }

        let handle = spawn_sweep_task(self.downgrade(), interval);
        if let Some(previous) = self.shared.sweeper.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn sweeper_running(&self) -> bool {
        self.shared
            .sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops scheduling further sweeps.
    pub fn shutdown(&self) {
        if let Some(handle) = self.shared.sweeper.lock().take() {
            handle.abort();
            tracing::info!("disk sweeper stopped");
        }
    }
}

impl EvictionPolicy for PersistentTier {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.shared.state.lock();
        let now = Utc::now();

        let Some(record) = state.index.get(key).cloned() else {
            state.stats.record_miss();
            return None;
        };

        if record.is_expired_at(now) {
            state.discard(key);
            state.persist();
            state.stats.record_miss();
            return None;
        }

        self.shared.disk_reads.fetch_add(1, Ordering::Relaxed);
        let blob_path = state.blob_path(key);
        let decoded = fs::read(&blob_path)
            .map_err(CacheError::from)
            .and_then(|bytes| codec::decode(&bytes, record.compressed));

        let value = match decoded {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "unreadable disk entry, removing stale index row");
                state.discard(key);
                state.persist();
                state.stats.record_miss();
                return None;
            }
        };

        let record = match state.index.get_mut(key) {
            Some(record) => {
                if now > record.last_accessed_at {
                    record.last_accessed_at = now;
                }
                record.access_count += 1;
                record.clone()
            }
            None => record,
        };
        state.recency.touch(key);
        state.persist();
        state.stats.record_hit();

        Some(CacheEntry {
            key: key.to_string(),
            value,
            size: record.size,
            created_at: record.created_at,
            last_accessed_at: record.last_accessed_at,
            access_count: record.access_count,
            ttl: record.ttl(),
            metadata: record.metadata,
        })
    }

    fn set(&self, key: &str, value: CacheValue, options: SetOptions) -> Result<()> {
        let compression = self.shared.compression;
        let bytes = codec::encode(&value, compression)?;
        let size = bytes.len() as u64;

        let mut state = self.shared.state.lock();
        state.forget(key);

        let needed = (state.current_size + size).saturating_sub(self.shared.max_size);
        if needed > 0 {
            state.reclaim(needed);
        }

        let blob_path = state.blob_path(key);
        if let Err(e) = fs::write(&blob_path, &bytes) {
            remove_blob(&blob_path);
            state.persist();
            return Err(e.into());
        }

        let now = Utc::now();
        state.index.insert(
            key.to_string(),
            IndexRecord {
                created_at: now,
                last_accessed_at: now,
                size,
                ttl_ms: options
                    .ttl
                    .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
                metadata: options.metadata,
                access_count: 0,
                compressed: compression,
            },
        );
        state.recency.touch(key);
        state.current_size += size;
        if let Err(e) = state.index.save() {
            // Not durable, so not admitted either
            state.discard(key);
            return Err(e);
        }

        warn_if_over_budget(self.name(), key, state.current_size, self.shared.max_size);
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        let mut state = self.shared.state.lock();
        let removed = state.discard(key).is_some();
        if removed {
            state.persist();
        }
        removed
    }

    fn clear(&self) {
        let mut state = self.shared.state.lock();
        let keys: Vec<String> = state.index.keys().cloned().collect();
        for key in &keys {
            remove_blob(&state.blob_path(key));
        }
        state.index.clear();
        state.recency.clear();
        state.current_size = 0;
        if let Err(e) = state.index.remove_file() {
            tracing::warn!(error = %e, "failed to remove disk index file");
        }
        tracing::info!(removed = keys.len(), "cleared disk tier");
    }

    fn contains(&self, key: &str) -> bool {
        let state = self.shared.state.lock();
        state
            .index
            .get(key)
            .is_some_and(|record| !record.is_expired_at(Utc::now()))
    }

    fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        state.stats.snapshot(state.current_size, state.index.len())
    }
}
