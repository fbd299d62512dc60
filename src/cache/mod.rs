//! Cache Module
//!
//! Response cache with per-entry TTL, pattern invalidation, and a single
//! expiry index drained by the background sweep.

mod entry;
mod expiry;
mod pattern;
mod stats;
mod store;


use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use entry::CacheEntry;
pub use expiry::ExpiryIndex;
pub use pattern::KeyPattern;
pub use stats::CacheStats;
pub use store::ResponseCache;

/// Cache handle shared between the scheduler, the sweep task, and callers.
pub type SharedCache<V> = Arc<RwLock<ResponseCache<V>>>;
