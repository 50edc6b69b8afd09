//! In-Memory Store Module
//!
//! Process-local document store with switchable faults for exercising
//! failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{check_revision, RecordStore, StoreError, StoreResult};
use crate::record::EntityRecord;

// == Store Faults ==
/// Faults that can be switched on at runtime.
#[derive(Debug, Default)]
struct StoreFaults {
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    conflict_writes: AtomicBool,
    latency_ms: AtomicU64,
}

// == Memory Store ==
/// Record store kept in a HashMap.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, EntityRecord>>,
    faults: StoreFaults,
    /// Number of records actually inserted by `create`
    creates: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // == Fault Injection ==
    /// Makes `find` and `find_all` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `create`, `replace` and `delete` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every `replace` lose a race: the stored revision moves on just
    /// before the check.
    pub fn conflict_writes(&self, conflict: bool) {
        self.faults.conflict_writes.store(conflict, Ordering::SeqCst);
    }

    /// Delays every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.faults
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    // == Inspection ==
    /// How many records `create` has inserted (not returned).
    pub fn create_count(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Writes a record directly, bypassing revision checks. Stands in for
    /// another process editing the store.
    pub async fn put_raw(&self, record: EntityRecord) {
        self.records.write().await.insert(record.key.clone(), record);
    }

    async fn before_read(&self) -> StoreResult<()> {
        self.delay().await;
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read fault injected".to_string()));
        }
        Ok(())
    }

    async fn before_write(&self) -> StoreResult<()> {
        self.delay().await;
        if self.faults.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write fault injected".to_string()));
        }
        Ok(())
    }

    async fn delay(&self) {
        let ms = self.faults.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(&self, key: &str) -> StoreResult<Option<EntityRecord>> {
        self.before_read().await?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn create(&self, key: &str, defaults: EntityRecord) -> StoreResult<EntityRecord> {
        self.before_write().await?;
        let mut records = self.records.write().await;
        let record = records.entry(key.to_string()).or_insert_with(|| {
            self.creates.fetch_add(1, Ordering::SeqCst);
            defaults
        });
        Ok(record.clone())
    }

    async fn replace(&self, record: &EntityRecord, expected_revision: u64) -> StoreResult<()> {
        self.before_write().await?;
        let mut records = self.records.write().await;
        if self.faults.conflict_writes.load(Ordering::SeqCst) {
            if let Some(stored) = records.get_mut(&record.key) {
                stored.revision += 1;
            }
        }
        check_revision(records.get(&record.key), &record.key, expected_revision)?;
        records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.before_write().await?;
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn find_all(&self) -> StoreResult<Vec<EntityRecord>> {
        self.before_read().await?;
        let records = self.records.read().await;
        let mut all: Vec<EntityRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}
