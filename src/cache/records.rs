//! Record Cache Module
//!
//! Read-through, write-through cache of entity records in front of a
//! [`RecordStore`].
//!
//! Every path that touches the store for a key runs inside that key's lock.
//! Writes reach the store before the cached snapshot is replaced, so a failed
//! or timed-out persist leaves the cache holding the last durable state.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheStats, KeyLocks};
use crate::config::Config;
use crate::error::{RecordError, Result};
use crate::record::{EntityRecord, RecordPatch, RecordSchema};
use crate::store::{RecordStore, StoreResult};

// == Cache Options ==
/// Tuning knobs for store access.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Upper bound on any single store call
    pub store_timeout: Duration,
    /// Reload-and-retry attempts after a revision conflict
    pub max_write_retries: u32,
    /// History capacity per action for histories set through `update`
    pub history_limits: BTreeMap<String, usize>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            max_write_retries: 3,
            history_limits: BTreeMap::new(),
        }
    }
}

// == Mutation ==
/// What a [`RecordCache::modify`] closure decided to do with the record.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    /// Persist the modified record
    Commit(T),
    /// Throw the working copy away and leave the record as it was
    Discard(T),
}

// == Evict Outcome ==
/// Result of a cache-only eviction attempted without waiting for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictOutcome {
    Evicted,
    /// The key is checked out by an in-flight operation
    Busy,
    /// Nothing was cached under the key
    Absent,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

// == Record Cache ==
/// The only owner of the in-memory record map.
pub struct RecordCache {
    store: Arc<dyn RecordStore>,
    schema: Arc<RecordSchema>,
    state: RwLock<CacheState>,
    locks: KeyLocks,
    options: CacheOptions,
}

impl RecordCache {
    // == Constructor ==
    pub fn new(store: Arc<dyn RecordStore>, schema: RecordSchema, options: CacheOptions) -> Self {
        Self {
            store,
            schema: Arc::new(schema),
            state: RwLock::new(CacheState::default()),
            locks: KeyLocks::new(),
            options,
        }
    }

    /// Builds a cache from the loaded configuration.
    pub fn from_config(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        let options = CacheOptions {
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            max_write_retries: config.max_write_retries,
            history_limits: config.registry().history_limits(),
        };
        Self::new(store, config.attribute_bounds.clone(), options)
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    // == Get Or Create ==
    /// Returns the cached record, loading it from the store on a miss.
    ///
    /// A key missing from the store is created with default attributes when
    /// `auto_create` is set; otherwise `Ok(None)` is returned. Concurrent
    /// callers for one uncached key share a single load.
    pub async fn get_or_create(&self, key: &str, auto_create: bool) -> Result<Option<EntityRecord>> {
        if let Some(record) = self.read_cached(key).await {
            return Ok(Some(record));
        }

        let _guard = self.locks.lock(key).await;
        self.load_locked(key, auto_create).await
    }

    // == Update ==
    /// Merges `patch` into the record and writes it through.
    ///
    /// Returns the merged record, or `Ok(None)` when the key has no record
    /// and `auto_create` is false. An empty patch writes nothing.
    pub async fn update(
        &self,
        key: &str,
        patch: &RecordPatch,
        auto_create: bool,
    ) -> Result<Option<EntityRecord>> {
        let schema = &self.schema;
        let limits = &self.options.history_limits;
        let updated = self
            .modify(key, auto_create, |record| {
                patch.apply_with_limits(record, schema, limits)?;
                Ok(Mutation::Commit(()))
            })
            .await?;

        Ok(updated.map(|(record, ())| record))
    }

    // == Modify ==
    /// Runs `f` against a working copy of the record while holding the key.
    ///
    /// `f` is synchronous, so no other operation on the key can observe or
    /// change the record between the read it sees and the write it commits.
    /// A committed copy that differs from the original is persisted with the
    /// next revision, then cached. On a revision conflict the record is
    /// reloaded and `f` runs again, up to `max_write_retries` times.
    pub async fn modify<T, F>(
        &self,
        key: &str,
        auto_create: bool,
        mut f: F,
    ) -> Result<Option<(EntityRecord, T)>>
    where
        F: FnMut(&mut EntityRecord) -> Result<Mutation<T>>,
    {
        let _guard = self.locks.lock(key).await;
        let mut attempt = 0;

        loop {
            let Some(current) = self.load_locked(key, auto_create).await? else {
                return Ok(None);
            };

            let mut working = current.clone();
            let value = match f(&mut working)? {
                Mutation::Discard(value) => return Ok(Some((current, value))),
                Mutation::Commit(value) => value,
            };

            working.key = current.key.clone();
            working.revision = current.revision;
            if working == current {
                return Ok(Some((current, value)));
            }
            working.revision = current.revision + 1;

            let persisted = self
                .call_store("replace", key, self.store.replace(&working, current.revision))
                .await;

            match persisted {
                Ok(()) => {
                    self.publish(working.clone(), true).await;
                    return Ok(Some((working, value)));
                }
                Err(RecordError::ConcurrentModification(msg)) => {
                    self.drop_entry(key).await;
                    if attempt >= self.options.max_write_retries {
                        return Err(RecordError::StoreUnavailable(format!(
                            "write to '{}' kept conflicting after {} retries: {}",
                            key, attempt, msg
                        )));
                    }
                    attempt += 1;
                    warn!("Revision conflict on '{}', reloading (attempt {})", key, attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    // == Evict ==
    /// Drops the cached copy and, unless `cache_only`, deletes the record
    /// from the store. Returns whether anything was removed.
    pub async fn evict(&self, key: &str, cache_only: bool) -> Result<bool> {
        let _guard = self.locks.lock(key).await;
        let was_cached = self.drop_entry(key).await;

        if cache_only {
            return Ok(was_cached);
        }

        let deleted = self
            .call_store("delete", key, self.store.delete(key))
            .await?;
        if deleted {
            info!("Deleted record '{}' from store", key);
        }
        Ok(deleted || was_cached)
    }

    /// Cache-only eviction that gives up instead of waiting when the key is
    /// checked out.
    pub async fn evict_if_idle(&self, key: &str) -> EvictOutcome {
        let Some(_guard) = self.locks.try_lock(key) else {
            return EvictOutcome::Busy;
        };

        let mut state = self.state.write().await;
        match state.entries.remove(key) {
            Some(entry) => {
                state.stats.record_eviction();
                let total = state.entries.len();
                state.stats.set_total_entries(total);
                debug!(
                    "Evicted '{}' from cache after {}s idle",
                    key,
                    entry.idle_for(Utc::now()).num_seconds()
                );
                EvictOutcome::Evicted
            }
            None => EvictOutcome::Absent,
        }
    }

    // == List All ==
    /// Every record in the store. Bypasses the cache.
    pub async fn list_all(&self) -> Result<Vec<EntityRecord>> {
        self.call_store("find_all", "*", self.store.find_all()).await
    }

    // == Refresh ==
    /// Re-reads one record from the store and replaces the cached copy.
    pub async fn refresh(&self, key: &str) -> Result<Option<EntityRecord>> {
        let _guard = self.locks.lock(key).await;
        match self.call_store("find", key, self.store.find(key)).await? {
            Some(record) => {
                self.publish(record.clone(), false).await;
                Ok(Some(record))
            }
            None => {
                self.drop_entry(key).await;
                Ok(None)
            }
        }
    }

    // == Introspection ==
    /// Snapshot of the keys currently cached.
    pub async fn cached_keys(&self) -> Vec<String> {
        self.state.read().await.entries.keys().cloned().collect()
    }

    pub async fn is_cached(&self, key: &str) -> bool {
        self.state.read().await.entries.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    /// Releases lock slots for keys nobody is using.
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }

    // == Internals ==
    async fn read_cached(&self, key: &str) -> Option<EntityRecord> {
        let mut state = self.state.write().await;
        let record = state.entries.get_mut(key).map(|entry| {
            entry.touch();
            entry.record.clone()
        });
        if record.is_some() {
            state.stats.record_hit();
        }
        record
    }

    /// Load path for callers already holding the key lock.
    async fn load_locked(&self, key: &str, auto_create: bool) -> Result<Option<EntityRecord>> {
        if let Some(entry) = self.state.read().await.entries.get(key) {
            return Ok(Some(entry.record.clone()));
        }

        self.state.write().await.stats.record_miss();

        let mut record = match self.call_store("find", key, self.store.find(key)).await? {
            Some(record) => record,
            None if auto_create => {
                let defaults = self.schema.default_record(key, Utc::now());
                let record = self
                    .call_store("create", key, self.store.create(key, defaults))
                    .await?;
                info!("Created record for '{}'", key);
                record
            }
            None => {
                debug!("No record for '{}' and auto-create is off", key);
                return Ok(None);
            }
        };

        // The next committed write persists the clamped values.
        if self.schema.conform(&mut record) {
            warn!("Clamped stored attributes of '{}' into current bounds", key);
        }

        self.publish(record.clone(), false).await;
        Ok(Some(record))
    }

    async fn publish(&self, record: EntityRecord, written: bool) {
        let mut state = self.state.write().await;
        state
            .entries
            .insert(record.key.clone(), CacheEntry::new(record));
        if written {
            state.stats.record_write();
        }
        let total = state.entries.len();
        state.stats.set_total_entries(total);
    }

    async fn drop_entry(&self, key: &str) -> bool {
        let mut state = self.state.write().await;
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.stats.record_eviction();
            let total = state.entries.len();
            state.stats.set_total_entries(total);
        }
        removed
    }

    /// Runs one store call under the configured timeout.
    async fn call_store<T, F>(&self, op: &str, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let timeout = self.options.store_timeout;
        let err = match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => RecordError::from(err),
            Err(_) => RecordError::StoreUnavailable(format!(
                "{} on '{}' timed out after {}ms",
                op,
                key,
                timeout.as_millis()
            )),
        };

        if matches!(err, RecordError::StoreUnavailable(_)) {
            self.state.write().await.stats.record_store_failure();
            warn!("Store {} on '{}' failed: {}", op, key, err);
        }
        Err(err)
    }
}
