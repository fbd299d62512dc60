//! Response Cache Store Module
//!
//! Key/value storage with per-entry TTL, enforced lazily on read and
//! proactively through the shared expiry index.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheStats, ExpiryIndex, KeyPattern};

// == Response Cache ==
/// In-memory response cache.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    expiry: ExpiryIndex,
    stats: CacheStats,
    next_generation: u64,
}

impl<V> Default for ResponseCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            expiry: ExpiryIndex::new(),
            stats: CacheStats::new(),
            next_generation: 0,
        }
    }
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous value and TTL.
    ///
    /// A positive `ttl` schedules expiry; None or zero keeps the value until
    /// it is deleted.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let generation = self.next_generation;
        self.next_generation += 1;

        let entry = CacheEntry::new(value, ttl, generation);
        if let Some(at) = entry.expires_at() {
            self.expiry.schedule(&key, generation, at);
        }
        self.entries.insert(key, entry);

        self.compact_expiry();
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the live value for `key`.
    ///
    /// An entry whose TTL has elapsed is removed here even if the sweep has
    /// not reached it yet.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
        }
        self.stats.record_miss();
        None
    }

    // == Delete ==
    /// Removes `key`. Returns whether an entry was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.record_invalidations(1);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Delete Matching ==
    /// Removes every entry whose key matches `pattern`. Returns the count.
    pub fn delete_matching(&mut self, pattern: &KeyPattern) -> usize {
        if let KeyPattern::Exact(key) = pattern {
            return usize::from(self.delete(key));
        }

        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern.matches(key));
        let removed = before - self.entries.len();

        self.stats.record_invalidations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Clear ==
    /// Empties the cache and drops every pending expiry record.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.expiry.clear();

        self.stats.record_invalidations(removed);
        self.stats.set_total_entries(0);
        removed
    }

    // == Purge Expired ==
    /// Removes every entry whose TTL has elapsed. Returns the count.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        while let Some((key, generation)) = self.expiry.pop_due(now) {
            let current = self
                .entries
                .get(&key)
                .is_some_and(|entry| entry.generation == generation);
            if current {
                self.entries.remove(&key);
                removed += 1;
            }
        }

        self.stats.record_expirations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    /// Live (unexpired) keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Earliest pending expiry, possibly of an overwritten or deleted entry.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.expiry.next_due()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Drops stale expiry records once they outnumber the live entries.
    fn compact_expiry(&mut self) {
        if self.expiry.len() <= 2 * self.entries.len() + 64 {
            return;
        }
        let entries = &self.entries;
        self.expiry.retain(|key, generation| {
            entries
                .get(key)
                .is_some_and(|entry| entry.generation == generation)
        });
    }
}
