//! Expiry Index Module
//!
//! One min-heap of expiry instants shared by every entry, drained by the
//! periodic sweep instead of arming a timer per key.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ExpiryRecord {
    at: Instant,
    generation: u64,
    key: String,
}

// == Expiry Index ==
/// Expiry instants ordered soonest first.
///
/// Records are never updated in place. Overwriting or deleting a key leaves
/// its old record behind; the store tells stale records apart by generation.
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    heap: BinaryHeap<Reverse<ExpiryRecord>>,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `key` at `generation` expires at `at`.
    pub fn schedule(&mut self, key: &str, generation: u64, at: Instant) {
        self.heap.push(Reverse(ExpiryRecord {
            at,
            generation,
            key: key.to_string(),
        }));
    }

    /// Pops the next record due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(String, u64)> {
        if self.heap.peek()?.0.at > now {
            return None;
        }
        self.heap
            .pop()
            .map(|Reverse(record)| (record.key, record.generation))
    }

    /// Earliest scheduled expiry, stale records included.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(record)| record.at)
    }

    /// Drops records for which `is_live` returns false.
    pub fn retain(&mut self, mut is_live: impl FnMut(&str, u64) -> bool) {
        self.heap
            .retain(|Reverse(record)| is_live(&record.key, record.generation));
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
