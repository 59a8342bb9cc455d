//! In-memory backing store.
//!
//! Serves scripted query results. Used by tests and by the binary when run
//! against a fixture file. Latency, reachability and dropped connections can
//! be simulated, and every query round trip is counted.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use super::{
    BackendError, Column, Connection, ConnectionParams, Connector, QueryResult, Row,
};

#[derive(Debug, Clone)]
enum Scripted {
    Rows { columns: Vec<Column>, rows: Vec<Row> },
    Error(String),
}

#[derive(Debug)]
struct Shared {
    queries: RwLock<HashMap<String, Scripted>>,
    reachable: AtomicBool,
    latency_ms: AtomicU64,
    connect_latency_ms: AtomicU64,
    generation: AtomicU64,
    round_trips: AtomicUsize,
    active_queries: AtomicUsize,
    peak_active_queries: AtomicUsize,
    connects: AtomicUsize,
    closed: AtomicUsize,
}

// == Memory Backend ==
/// A scripted backing store shared by every connection it opens.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    /// Creates a reachable store with no scripted queries.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queries: RwLock::new(HashMap::new()),
                reachable: AtomicBool::new(true),
                latency_ms: AtomicU64::new(0),
                connect_latency_ms: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                round_trips: AtomicUsize::new(0),
                active_queries: AtomicUsize::new(0),
                peak_active_queries: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }),
        }
    }

    /// Scripts `sql` to return the given columns and rows.
    pub fn set_result(&self, sql: impl Into<String>, columns: Vec<Column>, rows: Vec<Row>) {
        self.shared
            .queries
            .write()
            .insert(sql.into(), Scripted::Rows { columns, rows });
    }

    /// Scripts `sql` to fail with the given store error text.
    pub fn set_error(&self, sql: impl Into<String>, message: impl Into<String>) {
        self.shared
            .queries
            .write()
            .insert(sql.into(), Scripted::Error(message.into()));
    }

    /// Makes new connection attempts succeed or fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay applied to every query.
    pub fn set_latency(&self, latency: Duration) {
        self.shared
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delay applied to every connection attempt.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.shared
            .connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Drops every currently open connection, as a server restart would.
    pub fn drop_connections(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of queries executed so far.
    pub fn round_trips(&self) -> usize {
        self.shared.round_trips.load(Ordering::SeqCst)
    }

    /// Highest number of queries that were ever executing at once.
    pub fn peak_concurrent_queries(&self) -> usize {
        self.shared.peak_active_queries.load(Ordering::SeqCst)
    }

    /// Number of successful connects so far.
    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far.
    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Loads scripted queries from a JSON fixture file.
    pub fn from_fixture_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture file {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fixture file {}", path.display()))?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let backend = Self::new();
        for query in fixture.queries {
            match query.error {
                Some(message) => backend.set_error(query.sql, message),
                None => backend.set_result(query.sql, query.columns, query.rows),
            }
        }
        backend
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryBackend {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, BackendError> {
        let latency = self.shared.connect_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_millis(latency));
        }

        if !self.shared.reachable.load(Ordering::SeqCst) {
            return Err(BackendError::Unreachable(format!(
                "Can't connect to server on '{}' ({})",
                params.host, params.port
            )));
        }

        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        debug!(host = %params.host, database = %params.database, "memory backend connect");

        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            generation: self.shared.generation.load(Ordering::SeqCst),
        }))
    }
}

// == Memory Connection ==
struct MemoryConnection {
    shared: Arc<Shared>,
    generation: u64,
}

impl MemoryConnection {
    fn is_alive(&self) -> bool {
        self.generation == self.shared.generation.load(Ordering::SeqCst)
    }
}

impl Connection for MemoryConnection {
    fn query(&mut self, sql: &str) -> Result<QueryResult<'_>, BackendError> {
        if !self.is_alive() {
            return Err(BackendError::ConnectionLost(
                "Lost connection to server during query".to_string(),
            ));
        }

        self.shared.round_trips.fetch_add(1, Ordering::SeqCst);
        let active = self.shared.active_queries.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared
            .peak_active_queries
            .fetch_max(active, Ordering::SeqCst);

        let latency = self.shared.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_millis(latency));
        }
        self.shared.active_queries.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.shared.queries.read().get(sql).cloned();
        match scripted {
            Some(Scripted::Rows { columns, rows }) => Ok(QueryResult {
                columns,
                rows: Box::new(rows.into_iter().map(Ok)),
            }),
            Some(Scripted::Error(message)) => Err(BackendError::Query(message)),
            None => Err(BackendError::Query(format!("Unknown query '{}'", sql))),
        }
    }

    fn ping(&mut self) -> bool {
        self.is_alive() && self.shared.reachable.load(Ordering::SeqCst)
    }

    fn close(self: Box<Self>) {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// == Fixtures ==
/// Scripted queries loaded from JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    pub queries: Vec<FixtureQuery>,
}

/// One scripted query: either rows or an error.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureQuery {
    pub sql: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ColumnType;

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "db.local".to_string(),
            port: 3306,
            database: "shop".to_string(),
            user: "ro".to_string(),
            password: "pw".to_string(),
        }
    }

    #[test]
    fn test_scripted_rows() {
        let backend = MemoryBackend::new();
        backend.set_result(
            "SELECT 1",
            vec![Column::new("one", 3)],
            vec![vec![Some("1".to_string())]],
        );

        let mut conn = backend.connect(&params()).unwrap();
        let result = conn.query("SELECT 1").unwrap();
        assert_eq!(ColumnType::from_code(result.columns[0].type_code), ColumnType::Int);
        let rows: Vec<Row> = result.rows.map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![vec![Some("1".to_string())]]);
        assert_eq!(backend.round_trips(), 1);
    }

    #[test]
    fn test_scripted_error() {
        let backend = MemoryBackend::new();
        backend.set_error("SELECT nope", "Unknown column 'nope'");

        let mut conn = backend.connect(&params()).unwrap();
        let err = conn.query("SELECT nope").err().unwrap();
        assert_eq!(err, BackendError::Query("Unknown column 'nope'".to_string()));
    }

    #[test]
    fn test_unreachable() {
        let backend = MemoryBackend::new();
        backend.set_reachable(false);

        let result = backend.connect(&params());
        assert!(matches!(result, Err(BackendError::Unreachable(_))));
    }

    #[test]
    fn test_dropped_connection() {
        let backend = MemoryBackend::new();
        backend.set_result("SELECT 1", vec![], vec![]);
        let mut conn = backend.connect(&params()).unwrap();
        assert!(conn.ping());

        backend.drop_connections();

        assert!(!conn.ping());
        assert!(matches!(
            conn.query("SELECT 1"),
            Err(BackendError::ConnectionLost(_))
        ));
        assert_eq!(backend.round_trips(), 0);
    }

    #[test]
    fn test_fixture_parsing() {
        let raw = r#"{
            "queries": [
                {"sql": "SELECT id FROM t", "columns": [{"name": "id", "type_code": 3}],
                 "rows": [["1"], [null]]},
                {"sql": "SELECT broken", "error": "syntax error"}
            ]
        }"#;
        let fixture: Fixture = serde_json::from_str(raw).unwrap();
        let backend = MemoryBackend::from_fixture(fixture);

        let mut conn = backend.connect(&params()).unwrap();
        let rows: Vec<Row> = conn
            .query("SELECT id FROM t")
            .unwrap()
            .rows
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows, vec![vec![Some("1".to_string())], vec![None]]);
        assert!(conn.query("SELECT broken").is_err());
    }

    #[test]
    fn test_close_is_counted() {
        let backend = MemoryBackend::new();
        let conn = backend.connect(&params()).unwrap();
        conn.close();
        assert_eq!(backend.closed(), 1);
    }

    #[test]
    fn test_peak_concurrent_queries() {
        let backend = MemoryBackend::new();
        backend.set_result("SELECT 1", vec![Column::new("1", 8)], vec![]);
        backend.set_latency(Duration::from_millis(100));

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let threads: Vec<_> = (0..2)
            .map(|_| {
                let backend = backend.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let mut conn = backend.connect(&params()).unwrap();
                    barrier.wait();
                    assert!(conn.query("SELECT 1").is_ok());
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(backend.round_trips(), 2);
        assert_eq!(backend.peak_concurrent_queries(), 2);
    }
}
