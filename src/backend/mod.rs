//! Backend Module
//!
//! The backing relational store as seen by the cache: a connector that opens
//! connections, and connections that run queries, answer pings, and close.
//! Calls are blocking and must only be made from blocking worker threads.

mod memory;
mod types;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{Fixture, FixtureQuery, MemoryBackend};
pub use types::ColumnType;

/// Placeholder shown wherever a password would be echoed.
pub const REDACTED: &str = "********";

// == Backend Error ==
/// Errors raised by a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Store could not be reached while connecting
    #[error("{0}")]
    Unreachable(String),

    /// An open connection was dropped by the store
    #[error("{0}")]
    ConnectionLost(String),

    /// The store rejected the query; text is the store's own message
    #[error("{0}")]
    Query(String),
}

// == Connection Params ==
/// Parameters needed to open a connection to the backing store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &REDACTED)
            .finish()
    }
}

// == Result Metadata ==
/// One result column as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Store-native type code
    pub type_code: u8,
}

impl Column {
    pub fn new(name: impl Into<String>, type_code: u8) -> Self {
        Self {
            name: name.into(),
            type_code,
        }
    }
}

/// One result row; `None` is SQL NULL.
pub type Row = Vec<Option<String>>;

/// Result of a successful query: column metadata plus a lazy row stream.
pub struct QueryResult<'a> {
    pub columns: Vec<Column>,
    pub rows: Box<dyn Iterator<Item = Result<Row, BackendError>> + 'a>,
}

// == Traits ==
/// An open connection to the backing store.
pub trait Connection: Send {
    /// Runs a query and returns its columns and rows.
    fn query(&mut self, sql: &str) -> Result<QueryResult<'_>, BackendError>;

    /// Returns true if the connection is still usable.
    fn ping(&mut self) -> bool;

    /// Closes the connection.
    fn close(self: Box<Self>);
}

/// Opens connections to a backing store.
pub trait Connector: Send + Sync {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, BackendError>;
}
