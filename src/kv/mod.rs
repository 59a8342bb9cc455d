//! Key-Value Store Module
//!
//! In-memory ordered list store with TTL expiration, used as the cache's
//! storage for schema and row records.

mod entry;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{current_timestamp_ms, deadline_after, ListEntry};
pub use store::KvStore;

// == Public Constants ==
/// Maximum allowed key length in bytes. Keys embed query text.
pub const MAX_KEY_LENGTH: usize = 64 * 1024;
