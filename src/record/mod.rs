//! Record Store - table-scoped CRUD over JSON rows with equality filters.
//!
//! The service only ever needs four verbs (select, insert, upsert,
//! delete), so the contract stays that small. Rows are JSON maps and
//! filters are conjunctions of column equality predicates, which is all
//! the upstream relational service exposes to clients anyway.

pub mod memory;

pub use memory::MemoryRecordStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// A single row: column name to JSON value.
pub type Row = Map<String, Value>;

/// Conjunction of column equality predicates.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    predicates: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.predicates.push((column.to_string(), value.into()));
        self
    }

    /// True when every predicate matches the row's string value.
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|(column, value)| {
            row.get(column).and_then(Value::as_str) == Some(value.as_str())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated on {table} ({columns})")]
    Constraint { table: String, columns: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Bad row: {0}")]
    BadRow(String),
}

/// Table-scoped persistence contract.
///
/// `select` returns rows in store-insertion order. Absence of matching
/// rows is an empty result, never an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError>;

    /// Insert-or-replace keyed on `conflict_key`: an existing row with
    /// the same value in that column is replaced in place.
    async fn upsert(&self, table: &str, rows: Vec<Row>, conflict_key: &str)
        -> Result<(), StoreError>;

    /// Returns the number of rows removed.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError>;
}

/// Serialize a serde type into a [`Row`].
pub fn to_row<T: serde::Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value).map_err(|e| StoreError::BadRow(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::BadRow(format!("expected object, got {}", other))),
    }
}

/// Deserialize a [`Row`] back into a serde type.
pub fn from_row<T: serde::de::DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::BadRow(e.to_string()))
}
