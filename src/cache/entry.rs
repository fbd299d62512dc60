//! Cache Entry Module
//!
//! A stored response plus the bookkeeping needed to decide when it expires.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A single cached value.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the value was stored
    pub stored_at: Instant,
    /// Time to live, None = kept until deleted
    pub ttl: Option<Duration>,
    /// Distinguishes this write from earlier writes of the same key
    pub(crate) generation: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry stored now. A zero TTL means no expiry.
    pub fn new(value: V, ttl: Option<Duration>, generation: u64) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
            generation,
        }
    }

    /// Instant at which the entry stops being readable.
    ///
    /// None without a TTL, or when the TTL reaches past the clock's range.
    pub fn expires_at(&self) -> Option<Instant> {
        self.ttl.and_then(|ttl| self.stored_at.checked_add(ttl))
    }

    // == Is Expired ==
    /// An entry is readable only while `now - stored_at < ttl`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.stored_at) >= ttl,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_entry_without_ttl_never_expires() {
        let entry = CacheEntry::new("value", None, 0);

        advance(Duration::from_secs(86_400)).await;

        assert!(!entry.is_expired());
        assert!(entry.expires_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_means_no_expiry() {
        let entry = CacheEntry::new("value", Some(Duration::ZERO), 0);
        assert!(entry.ttl.is_none());
        assert!(!entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiration_boundary() {
        let entry = CacheEntry::new("value", Some(Duration::from_secs(10)), 0);

        advance(Duration::from_millis(9_999)).await;
        assert!(!entry.is_expired());

        advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired(), "entry should be expired once ttl has fully elapsed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_expired_at_explicit_instant() {
        let entry = CacheEntry::new("value", Some(Duration::from_secs(5)), 0);
        let stored = entry.stored_at;

        assert!(!entry.is_expired_at(stored + Duration::from_secs(4)));
        assert!(entry.is_expired_at(stored + Duration::from_secs(5)));
        assert_eq!(entry.expires_at(), Some(stored + Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_beyond_clock_range_never_expires() {
        let entry = CacheEntry::new("value", Some(Duration::from_secs(u64::MAX)), 0);

        assert!(entry.expires_at().is_none());
        advance(Duration::from_secs(86_400 * 365)).await;
        assert!(!entry.is_expired());
    }
}
