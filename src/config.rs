//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// How long a caller waits on a population before giving up, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Maximum number of fetch workers running at once
    pub max_fetch_workers: usize,
    /// JSON fixture file for the in-memory backing store
    pub fixtures_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `FETCH_TIMEOUT_MS` - Per-caller population wait (default: 1000)
    /// - `MAX_FETCH_WORKERS` - Concurrent fetch bound (default: 16)
    /// - `SCACHE_FIXTURES` - Fixture file path (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            fetch_timeout_ms: parse_var("FETCH_TIMEOUT_MS").unwrap_or(defaults.fetch_timeout_ms),
            max_fetch_workers: parse_var::<usize>("MAX_FETCH_WORKERS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_fetch_workers),
            fixtures_path: env::var("SCACHE_FIXTURES").ok().map(PathBuf::from),
        }
    }

    /// Per-caller population wait as a Duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            fetch_timeout_ms: 1000,
            max_fetch_workers: 16,
            fixtures_path: None,
        }
    }
}
