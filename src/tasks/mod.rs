//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expired key sweep: drops cached result sets past their TTL

mod cleanup;

pub use cleanup::{spawn_cleanup_task, sweep_expired};
