//! In-memory index of the cache directory.
//!
//! Entries are kept sorted oldest to newest by modification time and the
//! running total always equals the sum of entry sizes. The index is plain data;
//! the manager guards it with a mutex and performs file deletion itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A cached file known to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File name relative to the cache directory
    pub name: String,
    pub modified_at: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

impl CacheEntry {
    pub fn new(name: impl Into<String>, modified_at: DateTime<Utc>, size: u64) -> Self {
        Self {
            name: name.into(),
            modified_at,
            size,
        }
    }

    /// Whether the entry is older than `max_age_ms` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, max_age_ms: Option<i64>) -> bool {
        match max_age_ms {
            Some(max_age) => (now - self.modified_at).num_milliseconds() > max_age,
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheIndex {
    entries: VecDeque<CacheEntry>,
    total_bytes: u64,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from directory entries in any order.
    ///
    /// Names are expected to be unique, as they are within one directory.
    pub fn from_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        let mut entries: Vec<CacheEntry> = entries.into_iter().collect();
        entries.sort_by_key(|entry| entry.modified_at);
        let total_bytes = entries.iter().map(|entry| entry.size).sum();
        Self {
            entries: entries.into(),
            total_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Insert keeping oldest-first order.
    ///
    /// An existing entry with the same name is replaced, so a re-downloaded
    /// file is never counted twice.
    pub fn insert(&mut self, entry: CacheEntry) {
        self.remove(&entry.name);

        let position = self
            .entries
            .partition_point(|existing| existing.modified_at <= entry.modified_at);
        self.total_bytes += entry.size;
        self.entries.insert(position, entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<CacheEntry> {
        let position = self.entries.iter().position(|entry| entry.name == name)?;
        let entry = self.entries.remove(position)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    pub fn pop_oldest(&mut self) -> Option<CacheEntry> {
        let entry = self.entries.pop_front()?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    /// Whether the running total exceeds `limit`. Never true without a limit.
    pub fn exceeds(&self, limit: Option<u64>) -> bool {
        limit.is_some_and(|limit| self.total_bytes > limit)
    }

    /// Remove oldest entries until the running total fits `limit`.
    ///
    /// Returns the removed entries, oldest first. Stops early when the index
    /// runs empty.
    pub fn evict_to_fit(&mut self, limit: Option<u64>) -> Vec<CacheEntry> {
        let mut victims = Vec::new();
        while self.exceeds(limit) {
            match self.pop_oldest() {
                Some(entry) => victims.push(entry),
                None => break,
            }
        }
        victims
    }
}
