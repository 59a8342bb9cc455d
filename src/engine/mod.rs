//! Cache Engine Module
//!
//! The cache-population engine: a registry of named backing-store connections,
//! a key layout separating schema from rows, fetch workers running off the
//! request path, and a gate that parks callers until their fetch resolves.
//!
//! ## Flow
//!
//! A lookup resolves the cache definition, then reads the schema and row keys.
//! On a miss the caller joins (or starts) the single fetch in flight for that
//! key, the worker result is written with the definition's TTL, and the keys
//! are read once more.

mod cache;
mod gate;
pub mod keys;
mod registry;
mod stats;
mod worker;

pub use cache::{CacheEngine, CachedResultSet};
pub use gate::{BlockingGate, FetchKey, FetchOutcome, PendingFetch, Resolution};
pub use registry::{CacheDefinition, CacheInfo, ConnectionRegistry, NewCacheDefinition};
pub use stats::CacheStats;
pub use worker::{encode_row, ColumnMeta, FetchedResultSet, FIELD_SEPARATOR, NULL_TOKEN};
