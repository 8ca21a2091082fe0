//! Disk Sweep Task
//!
//! Background task that periodically removes expired disk tier entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::WeakPersistentTier;

/// Spawns a background task that sweeps expired entries from a disk tier.
///
/// The task holds only a weak handle: it exits on its own once the tier is
/// dropped. The sweep body runs on the blocking pool since it touches the
/// filesystem.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_sweep_task(tier: WeakPersistentTier, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting disk sweep task with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(tier) = tier.upgrade() else {
                debug!("Disk tier dropped, sweep task exiting");
                break;
            };

            let removed = match tokio::task::spawn_blocking(move || tier.sweep_expired()).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!("Disk sweep failed: {}", e);
                    continue;
                }
            };

            if removed > 0 {
                info!("Disk sweep: removed {} expired entries", removed);
            } else {
                debug!("Disk sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EvictionPolicy, PersistentTier, SetOptions};
    use crate::config::DiskTierConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> PersistentTier {
        PersistentTier::open(&DiskTierConfig {
            enabled: true,
            root_dir: dir.path().to_path_buf(),
            max_size: 1 << 20,
            compression: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_valid_entries() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir);
        tier.set("long_lived", json!("value"), SetOptions::with_ttl(Duration::from_secs(3600)))
            .unwrap();

        let handle = spawn_sweep_task(tier.downgrade(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(tier.get("long_lived"), Some(json!("value")));
        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_exits_when_tier_dropped() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir);

        let handle = spawn_sweep_task(tier.downgrade(), Duration::from_millis(20));
        drop(tier);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should exit once the tier is gone");
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir);

        let handle = spawn_sweep_task(tier.downgrade(), Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
