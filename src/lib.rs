//! scache - a self-populating query cache in front of a slow SQL store
//!
//! Query results are cached in an in-process key-value store under
//! per-definition prefixes. A miss parks the caller while a fetch worker runs
//! the query off the request path and writes schema and rows with the
//! definition's TTL.

pub mod api;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod kv;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use engine::CacheEngine;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
