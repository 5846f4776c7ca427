//! Cache statistics tracking.

/// Counters for cache activity, for monitoring and debugging.
///
/// Caching is best-effort, so failures show up here and in the trace log
/// rather than as errors at call sites.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Fetches that returned a cached binary
    pub hits: u64,
    /// Fetches that found no usable candidate
    pub misses: u64,
    /// Items written to disk
    pub stores: u64,
    /// Store attempts that failed on a filesystem error
    pub store_failures: u64,
    /// Store attempts abandoned because another writer held the lock
    pub lock_contention: u64,
}

impl CacheStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Record a fetch hit.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Record a fetch miss.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Record a completed store.
    pub fn record_store(&mut self) {
        self.stores += 1;
    }

    /// Record a store attempt that failed on a filesystem error.
    pub fn record_store_failure(&mut self) {
        self.store_failures += 1;
    }

    /// Record a store attempt abandoned to another writer.
    pub fn record_lock_contention(&mut self) {
        self.lock_contention += 1;
    }
}
