//! File Store Module
//!
//! Keeps every record in one JSON document on disk. Each write serializes
//! the full set to a temporary file and renames it over the old one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{check_revision, RecordStore, StoreError, StoreResult};
use crate::record::EntityRecord;

type Records = HashMap<String, EntityRecord>;

// == File Store ==
/// Record store persisted as a JSON array of records.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    records: Arc<Mutex<Records>>,
}

impl FileStore {
    // == Open ==
    /// Loads the document at `path`, or starts empty if it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let records = match fs::read(&path).await {
            Ok(bytes) => {
                let list: Vec<EntityRecord> = serde_json::from_slice(&bytes)?;
                list.into_iter().map(|r| (r.key.clone(), r)).collect()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        info!("File store opened at {} with {} records", path.display(), records.len());

        Ok(Self {
            path,
            records: Arc::new(Mutex::new(records)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Commit ==
    /// Applies `change` to a copy of the records and, when it reports a
    /// write, flushes the copy and swaps it in.
    ///
    /// The work runs on its own task. A caller that stops waiting (timeout,
    /// dropped request) cannot leave the file and the map disagreeing: the
    /// task still finishes both steps or neither.
    async fn commit<T, F>(&self, change: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Records) -> StoreResult<(T, bool)> + Send + 'static,
    {
        let records = Arc::clone(&self.records);
        let path = self.path.clone();

        tokio::spawn(async move {
            let mut records = records.lock().await;
            let mut next = records.clone();
            let (value, dirty) = change(&mut next)?;
            if dirty {
                flush(&path, &next).await?;
                *records = next;
            }
            Ok::<T, StoreError>(value)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("file store task failed: {}", err)))?
    }
}

// == Flush ==
/// Writes `records` to disk atomically.
async fn flush(path: &Path, records: &Records) -> StoreResult<()> {
    let mut list: Vec<&EntityRecord> = records.values().collect();
    list.sort_by(|a, b| a.key.cmp(&b.key));

    let json = serde_json::to_vec_pretty(&list)?;
    let tmp_path = path.with_extension("tmp");

    fs::write(&tmp_path, json).await?;
    fs::rename(&tmp_path, path).await?;

    debug!("Flushed {} records to {}", list.len(), path.display());
    Ok(())
}

#[async_trait]
impl RecordStore for FileStore {
    async fn find(&self, key: &str) -> StoreResult<Option<EntityRecord>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn create(&self, key: &str, defaults: EntityRecord) -> StoreResult<EntityRecord> {
        let key = key.to_string();
        self.commit(move |records| {
            if let Some(existing) = records.get(&key) {
                return Ok((existing.clone(), false));
            }
            records.insert(key, defaults.clone());
            Ok((defaults, true))
        })
        .await
    }

    async fn replace(&self, record: &EntityRecord, expected_revision: u64) -> StoreResult<()> {
        let record = record.clone();
        self.commit(move |records| {
            check_revision(records.get(&record.key), &record.key, expected_revision)?;
            records.insert(record.key.clone(), record);
            Ok(((), true))
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let key = key.to_string();
        self.commit(move |records| {
            let removed = records.remove(&key).is_some();
            Ok((removed, removed))
        })
        .await
    }

    async fn find_all(&self) -> StoreResult<Vec<EntityRecord>> {
        let records = self.records.lock().await;
        let mut all: Vec<EntityRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("records.json")).await.unwrap();
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        {
            let store = FileStore::open(&path).await.unwrap();
            let mut record = EntityRecord::new("u1", Utc::now());
            record.attributes.insert("thirst".into(), 40);
            store.create("u1", record.clone()).await.unwrap();

            record.revision = 1;
            record.attributes.insert("thirst".into(), 55);
            store.replace(&record, 0).await.unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        let record = reopened.find("u1").await.unwrap().unwrap();
        assert_eq!(record.attribute("thirst"), Some(55));
        assert_eq!(record.revision, 1);
    }

    #[tokio::test]
    async fn test_abandoned_replace_keeps_disk_and_memory_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = FileStore::open(&path).await.unwrap();

        let mut record = EntityRecord::new("u1", Utc::now());
        store.create("u1", record.clone()).await.unwrap();
        record.revision = 1;
        store.replace(&record, 0).await.unwrap();

        // The caller gives up almost immediately.
        record.revision = 2;
        let _ = tokio::time::timeout(Duration::from_micros(1), store.replace(&record, 1)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let in_memory = store.find("u1").await.unwrap().unwrap().revision;
        let on_disk = FileStore::open(&path)
            .await
            .unwrap()
            .find("u1")
            .await
            .unwrap()
            .unwrap()
            .revision;
        assert_eq!(in_memory, on_disk);
        assert_eq!(in_memory, 2);
    }

    #[tokio::test]
    async fn test_conflicting_replace_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = FileStore::open(&path).await.unwrap();

        let mut record = EntityRecord::new("u1", Utc::now());
        store.create("u1", record.clone()).await.unwrap();
        record.revision = 4;

        let result = store.replace(&record, 3).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.find("u1").await.unwrap().unwrap().revision, 0);
    }

    #[tokio::test]
    async fn test_delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = FileStore::open(&path).await.unwrap();
        store
            .create("u1", EntityRecord::new("u1", Utc::now()))
            .await
            .unwrap();
        assert!(store.delete("u1").await.unwrap());

        let reopened = FileStore::open(&path).await.unwrap();
        assert!(reopened.find("u1").await.unwrap().is_none());
    }
}
