//! Admission Queue Module
//!
//! FIFO of requests waiting for an execution slot, optionally bounded.

use std::collections::VecDeque;
use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// == Overflow Policy ==
/// What happens when a request arrives at a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// The arriving request fails with `QueueFull`
    #[default]
    RejectNewest,
    /// The longest-waiting request fails with `QueueFull` and the arrival is queued
    DropOldest,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "reject-newest" => Ok(OverflowPolicy::RejectNewest),
            "drop-oldest" => Ok(OverflowPolicy::DropOldest),
            other => Err(ConfigError::Invalid {
                name: "OVERFLOW_POLICY",
                value: other.to_string(),
            }),
        }
    }
}

/// A request waiting for admission. `job` has not been polled yet.
pub(crate) struct QueuedRequest<V> {
    pub key: String,
    pub ttl: Option<Duration>,
    pub job: BoxFuture<'static, Result<V>>,
}

pub(crate) enum Enqueued<V> {
    Accepted,
    /// Queue full under `RejectNewest`; the request is handed back
    Rejected(QueuedRequest<V>),
    /// Queue full under `DropOldest`; the displaced request is handed back
    Displaced(QueuedRequest<V>),
}

// == Admission Queue ==
pub(crate) struct AdmissionQueue<V> {
    slots: VecDeque<QueuedRequest<V>>,
    max_depth: Option<usize>,
    policy: OverflowPolicy,
}

impl<V> AdmissionQueue<V> {
    pub fn new(max_depth: Option<usize>, policy: OverflowPolicy) -> Self {
        Self {
            slots: VecDeque::new(),
            max_depth,
            policy,
        }
    }

    pub fn push(&mut self, request: QueuedRequest<V>) -> Enqueued<V> {
        let full = self
            .max_depth
            .is_some_and(|depth| self.slots.len() >= depth);
        if !full {
            self.slots.push_back(request);
            return Enqueued::Accepted;
        }

        match self.policy {
            OverflowPolicy::RejectNewest => Enqueued::Rejected(request),
            OverflowPolicy::DropOldest => match self.slots.pop_front() {
                Some(oldest) => {
                    self.slots.push_back(request);
                    Enqueued::Displaced(oldest)
                }
                None => Enqueued::Rejected(request),
            },
        }
    }

    /// Oldest waiting request.
    pub fn pop(&mut self) -> Option<QueuedRequest<V>> {
        self.slots.pop_front()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_depth.unwrap_or(usize::MAX)
    }
}
