//! List Entry Module
//!
//! Defines a single list-valued key with optional expiration.

use std::time::{SystemTime, UNIX_EPOCH};

// == List Entry ==
/// A list value stored under one key, with expiration metadata.
#[derive(Debug, Clone)]
pub struct ListEntry {
    /// Ordered list items
    pub items: Vec<String>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl ListEntry {
    // == Constructor ==
    /// Creates an empty list with no expiration.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            created_at: current_timestamp_ms(),
            expires_at: None,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the given instant.
    ///
    /// An entry is expired once `now >= expires_at`, so two keys sharing one
    /// deadline are always observed as expired together for the same `now`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks if the entry has expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }

    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| ms / 1000)
    }
}

impl Default for ListEntry {
    fn default() -> Self {
        Self::new()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the absolute deadline `ttl_seconds` from now, in Unix milliseconds.
pub fn deadline_after(ttl_seconds: u64) -> u64 {
    current_timestamp_ms().saturating_add(ttl_seconds.saturating_mul(1000))
}
