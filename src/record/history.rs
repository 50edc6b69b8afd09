//! Bounded History Module
//!
//! Fixed-capacity, oldest-first sequence of action timestamps.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Bounded History ==
/// Timestamps of one action, most recent last.
///
/// Holds at most `capacity` entries; pushing onto a full history drops the
/// oldest entry first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedHistory {
    capacity: usize,
    entries: VecDeque<DateTime<Utc>>,
}

impl BoundedHistory {
    // == Constructor ==
    /// Creates an empty history holding at most `capacity` timestamps.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Builds a history from existing timestamps, keeping only the newest
    /// `capacity` of them.
    pub fn from_entries<I>(capacity: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let mut history = Self::new(capacity);
        for at in entries {
            history.push(at);
        }
        history
    }

    // == Push ==
    /// Appends a timestamp, dropping the oldest entries beyond capacity.
    pub fn push(&mut self, at: DateTime<Utc>) {
        self.entries.push_back(at);
        self.trim();
    }

    // == Resize ==
    /// Changes the capacity, trimming the oldest entries if it shrank.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.trim();
    }

    fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    // == Accessors ==
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates timestamps oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.entries.iter()
    }

    /// The newest `n` timestamps, oldest first. Returns fewer when the
    /// history is shorter than `n`.
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &DateTime<Utc>> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }

    pub fn last(&self) -> Option<&DateTime<Utc>> {
        self.entries.back()
    }
}
