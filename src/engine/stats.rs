//! Cache Statistics Module
//!
//! Tracks lookups, populations, and failures across all cache definitions.

use serde::Serialize;

// == Cache Stats ==
/// Engine-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the key-value store
    pub hits: u64,
    /// Lookups that needed a population
    pub misses: u64,
    /// Fetches that wrote a result set into the store
    pub populations: u64,
    /// Fetches that ended with a connect, query, or worker error
    pub fetch_failures: u64,
    /// Callers that gave up waiting on a fetch
    pub timeouts: u64,
    /// Callers that waited on a fetch dispatched by someone else
    pub joined: u64,
    /// Keys currently held by the key-value store
    pub total_keys: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
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

    pub fn record_population(&mut self) {
        self.populations += 1;
    }

    pub fn record_fetch_failure(&mut self) {
        self.fetch_failures += 1;
    }

    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    pub fn record_joined(&mut self) {
        self.joined += 1;
    }

    pub fn set_total_keys(&mut self, count: usize) {
        self.total_keys = count;
    }
}
