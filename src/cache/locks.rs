//! Per-Key Locks Module
//!
//! One async mutex per record key, so reads and writes of different keys
//! never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held for the duration of one key's critical section.
pub type KeyGuard = OwnedMutexGuard<()>;

// == Key Locks ==
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    // == Lock ==
    /// Waits until the key is free and checks it out.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        self.slot(key).lock_owned().await
    }

    /// Checks the key out only if nobody holds it right now.
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard> {
        self.slot(key).try_lock_owned().ok()
    }

    // == Prune ==
    /// Drops slots nobody holds or waits on. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_lock_fails_while_held() {
        let locks = KeyLocks::new();
        let guard = locks.lock("a").await;

        assert!(locks.try_lock("a").is_none());
        assert!(locks.try_lock("b").is_some());

        drop(guard);
        assert!(locks.try_lock("a").is_some());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_slots() {
        let locks = KeyLocks::new();
        let held = locks.lock("a").await;
        drop(locks.lock("b").await);

        assert_eq!(locks.len(), 2);
        assert_eq!(locks.prune(), 1);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert_eq!(locks.prune(), 1);
        assert!(locks.is_empty());
    }
}
