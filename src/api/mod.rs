//! API Module
//!
//! HTTP handlers, routing, and the argv command surface for the cache server.
//!
//! # Endpoints
//! - `/caches` and `/caches/:name/...` - REST form of every cache operation
//! - `POST /command` - Argv form, e.g. `{"args":["SCACHE.GET","orders","SELECT 1"]}`
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod command;
pub mod handlers;
pub mod routes;

pub use command::{Command, CommandReply};
pub use handlers::*;
pub use routes::create_router;
