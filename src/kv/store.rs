//! Key-Value Store Module
//!
//! Ordered list store with per-key TTL expiration. Backs the cached schema and
//! row records written by the population engine.

use std::collections::HashMap;

use crate::error::{CacheError, Result};
use crate::kv::entry::{current_timestamp_ms, deadline_after};
use crate::kv::{ListEntry, MAX_KEY_LENGTH};

// == Kv Store ==
/// List-valued key-value store with lazy and periodic expiration.
#[derive(Debug, Default)]
pub struct KvStore {
    /// Key to list storage
    entries: HashMap<String, ListEntry>,
}

impl KvStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    // == List Range ==
    /// Returns the full list stored under `key`.
    ///
    /// Absent and expired keys both yield an empty list; expired keys are
    /// removed on the way.
    pub fn lrange(&mut self, key: &str) -> Vec<String> {
        let now = current_timestamp_ms();
        self.lrange_at(key, now)
    }

    /// Returns the lists stored under each key, evaluated at a single instant.
    ///
    /// Keys that share one deadline are therefore either all present or all
    /// absent in the result.
    pub fn lrange_many(&mut self, keys: &[&str]) -> Vec<Vec<String>> {
        let now = current_timestamp_ms();
        keys.iter().map(|key| self.lrange_at(key, now)).collect()
    }

    fn lrange_at(&mut self, key: &str, now: u64) -> Vec<String> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                self.entries.remove(key);
                Vec::new()
            }
            Some(entry) => entry.items.clone(),
            None => Vec::new(),
        }
    }

    // == Right Push ==
    /// Appends items to the list under `key`, creating it if needed.
    ///
    /// An existing expiration is preserved. Returns the new list length.
    pub fn rpush<I>(&mut self, key: &str, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = String>,
    {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if self.entries.get(key).is_some_and(ListEntry::is_expired) {
            self.entries.remove(key);
        }

        let entry = self.entries.entry(key.to_string()).or_default();
        entry.items.extend(items);
        Ok(entry.items.len())
    }

    // == Expire ==
    /// Sets a TTL in seconds on an existing key. Returns false if absent.
    pub fn expire(&mut self, key: &str, ttl_seconds: u64) -> bool {
        self.expire_at(key, deadline_after(ttl_seconds))
    }

    /// Sets an absolute deadline (Unix milliseconds) on an existing key.
    pub fn expire_at(&mut self, key: &str, deadline_ms: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.expires_at = Some(deadline_ms);
                true
            }
            _ => false,
        }
    }

    // == Time To Live ==
    /// Remaining TTL in seconds; None for absent keys or keys without TTL.
    pub fn ttl(&mut self, key: &str) -> Option<u64> {
        let now = current_timestamp_ms();
        match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                self.entries.remove(key);
                None
            }
            Some(entry) => entry.ttl_remaining(),
            None => None,
        }
    }

    // == Delete ==
    /// Removes a key. Returns true if it existed.
    pub fn del(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Delete By Prefix ==
    /// Removes every key starting with `prefix`. Returns the number removed.
    pub fn delete_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    // == Length ==
    /// Returns the number of keys currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
