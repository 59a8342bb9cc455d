//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::backend::ConnectionParams;
use crate::engine::NewCacheDefinition;

/// Request body for creating a cache definition (POST /caches)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCacheRequest {
    /// Cache name, used as key prefix
    pub name: String,
    /// Default TTL in seconds
    pub ttl: u64,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl CreateCacheRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    /// TTL and port ranges are checked when the definition is created.
    pub fn validate(&self) -> Option<String> {
        if self.name.is_empty() {
            return Some("Cache name cannot be empty".to_string());
        }
        if self.host.is_empty() {
            return Some("Host cannot be empty".to_string());
        }
        None
    }

    pub fn into_definition(self) -> NewCacheDefinition {
        NewCacheDefinition {
            name: self.name,
            ttl: self.ttl,
            params: ConnectionParams {
                host: self.host,
                port: self.port,
                database: self.database,
                user: self.user,
                password: self.password,
            },
        }
    }
}

/// Request body for value and meta lookups
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Query text, sent verbatim to the backing store on a miss
    pub query: String,
}

impl QueryRequest {
    pub fn validate(&self) -> Option<String> {
        if self.query.trim().is_empty() {
            return Some("Query cannot be empty".to_string());
        }
        None
    }
}

/// Request body for the argv-style command endpoint (POST /command)
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Command name followed by its arguments
    pub args: Vec<String>,
}
