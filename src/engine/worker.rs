//! Fetch worker - one backing-store round trip.
//!
//! Runs on a blocking thread. Holds the definition's handle lock for the whole
//! round trip and never touches the registry lock.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{BackendError, ColumnType, Connection, Connector, QueryResult, Row};
use crate::engine::registry::CacheDefinition;
use crate::error::{CacheError, Result};

/// Text stored for SQL NULL values.
pub const NULL_TOKEN: &str = "NULL";

/// Separator between column values in a row record.
pub const FIELD_SEPARATOR: &str = "|";

// == Column Meta ==
/// One column of a schema record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Flattens columns into the stored schema record: name, type, name, type...
    pub fn encode_schema(columns: &[ColumnMeta]) -> Vec<String> {
        columns
            .iter()
            .flat_map(|c| [c.name.clone(), c.type_name.clone()])
            .collect()
    }

    /// Rebuilds columns from a stored schema record. A dangling trailing
    /// name without a type is dropped.
    pub fn decode_schema(entries: Vec<String>) -> Vec<ColumnMeta> {
        let mut columns = Vec::with_capacity(entries.len() / 2);
        let mut iter = entries.into_iter();
        while let (Some(name), Some(type_name)) = (iter.next(), iter.next()) {
            columns.push(ColumnMeta { name, type_name });
        }
        columns
    }
}

// == Fetched Result Set ==
/// A query result translated into the cache's storage format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedResultSet {
    pub columns: Vec<ColumnMeta>,
    /// Pipe-joined row records
    pub rows: Vec<String>,
}

/// Joins one row's values, writing `NULL` for SQL NULL.
pub fn encode_row(row: &[Option<String>]) -> String {
    row.iter()
        .map(|value| value.as_deref().unwrap_or(NULL_TOKEN))
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
}

// == Fetch ==
/// Runs `query` for `definition`, reconnecting once if the handle was dropped.
///
/// Blocking. Nothing is written anywhere; the caller stores the result.
pub fn fetch(
    connector: &dyn Connector,
    definition: &CacheDefinition,
    query: &str,
) -> Result<FetchedResultSet> {
    let mut handle = definition.handle().lock();

    // Deleted while queued; its handle is closed or about to be.
    if definition.is_retired() {
        return Err(CacheError::NotFound(definition.name().to_string()));
    }

    let alive = handle.as_mut().map(|c| c.ping()).unwrap_or(false);
    if !alive {
        debug!(cache = %definition.name(), "store handle not alive, reconnecting");
        if let Some(stale) = handle.take() {
            stale.close();
        }
        *handle = Some(connector.connect(definition.params())?);
    }

    let first = match handle.as_mut() {
        Some(connection) => run_query(connection, query),
        None => return Err(CacheError::Internal("store handle missing".to_string())),
    };

    match first {
        Err(BackendError::ConnectionLost(msg)) => {
            warn!(cache = %definition.name(), error = %msg, "connection lost during query, retrying once");
            let mut connection = connector.connect(definition.params())?;
            let retried = run_query(&mut connection, query);
            if let Some(stale) = handle.replace(connection) {
                stale.close();
            }
            retried.map_err(CacheError::from)
        }
        other => other.map_err(CacheError::from),
    }
}

fn run_query(
    connection: &mut Box<dyn Connection>,
    query: &str,
) -> std::result::Result<FetchedResultSet, BackendError> {
    let QueryResult { columns, rows } = connection.query(query)?;

    let columns = columns
        .into_iter()
        .map(|column| ColumnMeta {
            type_name: ColumnType::from_code(column.type_code).as_str().to_string(),
            name: column.name,
        })
        .collect();

    let rows = rows
        .map(|row| row.map(|r: Row| encode_row(&r)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(FetchedResultSet { columns, rows })
}
