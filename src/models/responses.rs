//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::engine::{CacheStats, ColumnMeta};

pub use crate::engine::CacheInfo;

/// Response body for listing cache definitions (GET /caches)
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    /// Cache names in creation order
    pub caches: Vec<String>,
}

/// Response body for pinging a definition's store handle
#[derive(Debug, Clone, Serialize)]
pub struct TestResponse {
    pub name: String,
    pub alive: bool,
}

/// Response body for flushing a cache's keys
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    pub name: String,
    /// Number of keys removed
    pub removed: usize,
}

/// Response body for deleting a cache definition
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    pub name: String,
    /// Number of cached keys flushed with it
    pub removed: usize,
}

impl DeleteResponse {
    pub fn new(name: impl Into<String>, removed: usize) -> Self {
        let name = name.into();
        Self {
            message: format!("Cache '{}' deleted successfully", name),
            name,
            removed,
        }
    }
}

/// Response body for a row lookup
#[derive(Debug, Clone, Serialize)]
pub struct ValueResponse {
    pub name: String,
    pub query: String,
    /// Pipe-joined rows
    pub rows: Vec<String>,
}

/// Response body for a schema lookup
#[derive(Debug, Clone, Serialize)]
pub struct MetaResponse {
    pub name: String,
    pub query: String,
    pub columns: Vec<ColumnMeta>,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub populations: u64,
    pub fetch_failures: u64,
    pub timeouts: u64,
    pub joined: u64,
    /// Keys currently held by the key-value store
    pub total_keys: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            populations: stats.populations,
            fetch_failures: stats.fetch_failures,
            timeouts: stats.timeouts,
            joined: stats.joined,
            total_keys: stats.total_keys,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
    /// Machine-readable error tag
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
        }
    }
}
