//! Cache Sweeper Task
//!
//! Background task that periodically evicts cache entries for keys that are
//! no longer live. Only the cache is touched; the store keeps every record.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{EvictOutcome, RecordCache};

// == Liveness Source ==
/// Tells the sweeper which keys still matter.
pub trait LivenessSource: Send + Sync {
    fn is_live(&self, key: &str) -> bool;

    /// Called once at the end of every sweep pass.
    fn sweep_finished(&self) {}
}

impl<F> LivenessSource for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_live(&self, key: &str) -> bool {
        self(key)
    }
}

// == Sweep Report ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Keys looked at
    pub scanned: usize,
    /// Entries removed from the cache
    pub evicted: usize,
    /// Dead keys skipped because an operation had them checked out
    pub busy: usize,
    /// Keys left in place (live, or liveness could not be determined)
    pub kept: usize,
}

// == Sweep ==
/// Runs one pass over the keys cached right now.
///
/// A liveness check that panics only affects its own key, which is kept.
pub async fn sweep(cache: &RecordCache, liveness: &dyn LivenessSource) -> SweepReport {
    let mut report = SweepReport::default();

    for key in cache.cached_keys().await {
        report.scanned += 1;

        let live = match catch_unwind(AssertUnwindSafe(|| liveness.is_live(&key))) {
            Ok(live) => live,
            Err(_) => {
                warn!("Liveness check panicked for '{}', keeping entry", key);
                report.kept += 1;
                continue;
            }
        };

        if live {
            report.kept += 1;
            continue;
        }

        match cache.evict_if_idle(&key).await {
            EvictOutcome::Evicted => report.evicted += 1,
            EvictOutcome::Busy => {
                debug!("Skipping '{}' during sweep: checked out", key);
                report.busy += 1;
            }
            EvictOutcome::Absent => {}
        }
    }

    cache.prune_locks();
    liveness.sweep_finished();
    report
}

/// Spawns a background task that sweeps the cache every `interval`.
///
/// The task runs in an infinite loop, sleeping for the interval between
/// passes.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweeper_task(cache.clone(), sessions.clone(), Duration::from_secs(3600));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweeper_task(
    cache: Arc<RecordCache>,
    liveness: Arc<dyn LivenessSource>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache sweeper with interval of {}ms", interval.as_millis());

        loop {
            tokio::time::sleep(interval).await;

            let report = sweep(&cache, liveness.as_ref()).await;

            if report.evicted > 0 || report.busy > 0 {
                info!(
                    "Cache sweep: scanned {}, evicted {}, busy {}",
                    report.scanned, report.evicted, report.busy
                );
            } else {
                debug!("Cache sweep: nothing to evict among {} entries", report.scanned);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use crate::record::{AttributeBounds, RecordPatch, RecordSchema};
    use crate::store::{MemoryStore, RecordStore};

    fn setup() -> (Arc<MemoryStore>, Arc<RecordCache>) {
        let store = Arc::new(MemoryStore::new());
        let schema = RecordSchema::default().with_attribute("thirst", AttributeBounds::new(0, 100));
        let cache = Arc::new(RecordCache::new(
            store.clone(),
            schema,
            CacheOptions::default(),
        ));
        (store, cache)
    }

    async fn fill(cache: &RecordCache, keys: &[&str]) {
        for key in keys {
            cache.get_or_create(key, true).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweep_evicts_dead_keys_only() {
        let (store, cache) = setup();
        fill(&cache, &["A", "B", "C"]).await;

        let report = sweep(&cache, &|key: &str| key != "B").await;

        assert_eq!(report.scanned, 3);
        assert_eq!(report.evicted, 1);
        let mut keys = cache.cached_keys().await;
        keys.sort();
        assert_eq!(keys, vec!["A", "C"]);
        assert!(store.find("B").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_skips_checked_out_key() {
        let (store, cache) = setup();
        fill(&cache, &["A"]).await;

        // Hold the key through a slow write while the sweep runs.
        store.set_latency(Duration::from_millis(300));
        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .update("A", &RecordPatch::new().attribute("thirst", 5), false)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = sweep(&cache, &|_: &str| false).await;
        assert_eq!(report.busy, 1);
        assert_eq!(report.evicted, 0);

        writer.await.unwrap().unwrap();
        assert!(cache.is_cached("A").await);
    }

    #[tokio::test]
    async fn test_sweep_survives_panicking_liveness() {
        let (_store, cache) = setup();
        fill(&cache, &["A", "B"]).await;

        let report = sweep(&cache, &|key: &str| {
            if key == "A" {
                panic!("liveness source unavailable");
            }
            false
        })
        .await;

        assert_eq!(report.scanned, 2);
        assert_eq!(report.evicted, 1);
        assert!(cache.is_cached("A").await);
        assert!(!cache.is_cached("B").await);
    }

    #[tokio::test]
    async fn test_sweeper_task_runs_periodically() {
        let (store, cache) = setup();
        fill(&cache, &["A", "B"]).await;

        let liveness: Arc<dyn LivenessSource> = Arc::new(|key: &str| key == "A");
        let handle = spawn_sweeper_task(cache.clone(), liveness, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert!(cache.is_cached("A").await);
        assert!(!cache.is_cached("B").await);
        assert_eq!(store.len().await, 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_task_can_be_aborted() {
        let (_store, cache) = setup();
        let liveness: Arc<dyn LivenessSource> = Arc::new(|_: &str| true);

        let handle = spawn_sweeper_task(cache, liveness, Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
