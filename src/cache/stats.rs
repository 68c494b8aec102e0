//! Cache Statistics Module
//!
//! Tracks memoization outcomes: hits, misses, expirations and the failures
//! that were absorbed instead of propagated.

use serde::Serialize;

// == Cache Stats ==
/// Counters kept by a `TimeCache`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from a fresh entry
    pub hits: u64,
    /// Calls that invoked the wrapped callable (includes expirations)
    pub misses: u64,
    /// Stale entries removed on lookup
    pub expirations: u64,
    /// Computed results returned without being persisted
    pub persist_failures: u64,
    /// Store errors absorbed by the degrade policy
    pub store_errors: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no calls have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_persist_failure(&mut self) {
        self.persist_failures += 1;
    }

    pub fn record_store_error(&mut self) {
        self.store_errors += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.expirations, 0);
        assert_eq!(stats.persist_failures, 0);
        assert_eq!(stats.store_errors, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_failure_counters() {
        let mut stats = CacheStats::new();
        stats.record_expiration();
        stats.record_persist_failure();
        stats.record_persist_failure();
        stats.record_store_error();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.persist_failures, 2);
        assert_eq!(stats.store_errors, 1);
    }
}
