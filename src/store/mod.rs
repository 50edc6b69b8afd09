//! Record Store Module
//!
//! Durable persistence behind the cache. The cache only talks to the
//! [`RecordStore`] trait; implementations decide where documents live.

mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::EntityRecord;

pub use file::FileStore;
pub use memory::MemoryStore;

// == Store Error ==
/// Failures reported by a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The stored revision is not the one the writer read
    #[error("revision conflict on '{key}': expected {expected}, found {found}")]
    Conflict { key: String, expected: u64, found: u64 },

    /// Replace targeted a record that no longer exists
    #[error("record '{0}' no longer exists")]
    Missing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Record Store Trait ==
/// Document store holding the authoritative copy of every record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Looks up one record.
    async fn find(&self, key: &str) -> StoreResult<Option<EntityRecord>>;

    /// Inserts `defaults` under `key` unless a record already exists, and
    /// returns whatever is stored afterwards. Calling it twice for the same
    /// key never yields two records.
    async fn create(&self, key: &str, defaults: EntityRecord) -> StoreResult<EntityRecord>;

    /// Overwrites the record if the stored revision still equals
    /// `expected_revision`.
    async fn replace(&self, record: &EntityRecord, expected_revision: u64) -> StoreResult<()>;

    /// Removes the record. Returns whether anything was deleted.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Every stored record, in key order.
    async fn find_all(&self) -> StoreResult<Vec<EntityRecord>>;
}

/// Checks the optimistic revision of a stored record against a writer's.
pub(crate) fn check_revision(
    stored: Option<&EntityRecord>,
    key: &str,
    expected: u64,
) -> StoreResult<()> {
    match stored {
        None => Err(StoreError::Missing(key.to_string())),
        Some(current) if current.revision != expected => Err(StoreError::Conflict {
            key: key.to_string(),
            expected,
            found: current.revision,
        }),
        Some(_) => Ok(()),
    }
}
