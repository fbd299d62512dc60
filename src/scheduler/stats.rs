//! Scheduler counters.

use serde::Serialize;

// == Scheduler Stats ==
/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Underlying executions running now
    pub executing: usize,
    /// Requests waiting for admission
    pub queued: usize,
    /// Keys with an in-flight entry (queued or executing)
    pub in_flight: usize,
    /// Calls to submit
    pub submitted: u64,
    /// Submissions answered from the cache
    pub cache_hits: u64,
    /// Submissions attached to an existing in-flight entry
    pub deduplicated: u64,
    /// Underlying executions started
    pub executions: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Requests refused or displaced by the queue bound
    pub rejected: u64,
}
