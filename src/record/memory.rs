//! In-memory record store.
//!
//! Reference backend for tests and single-node deployments. Tables are
//! ordered row vectors behind one RwLock, so `select` naturally returns
//! insertion order. Declared unique keys are checked inside the write
//! lock, which makes duplicate inserts lose deterministically instead of
//! racing a caller-side pre-read.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Filter, RecordStore, Row, StoreError};

#[derive(Default)]
struct Table {
    rows: Vec<Row>,
    /// Each entry is one (possibly compound) unique key.
    unique_keys: Vec<Vec<String>>,
}

impl Table {
    fn key_values(row: &Row, key: &[String]) -> Vec<Option<String>> {
        key.iter()
            .map(|column| row.get(column).and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    fn violates_unique(&self, candidate: &Row, skip_index: Option<usize>) -> Option<&Vec<String>> {
        for key in &self.unique_keys {
            let values = Self::key_values(candidate, key);
            let clash = self.rows.iter().enumerate().any(|(i, row)| {
                Some(i) != skip_index && Self::key_values(row, key) == values
            });
            if clash {
                return Some(key);
            }
        }
        None
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        MemoryRecordStore::default()
    }

    /// Declare a (possibly compound) unique key for a table. Must run
    /// before the first write touches that key.
    pub async fn declare_unique(&self, table: &str, columns: &[&str]) {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();
        entry
            .unique_keys
            .push(columns.iter().map(|c| c.to_string()).collect());
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        let Some(entry) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(entry
            .rows
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Some(key) = entry.violates_unique(&row, None) {
                return Err(StoreError::Constraint {
                    table: table.to_string(),
                    columns: key.join(", "),
                });
            }
            entry.rows.push(row);
        }
        Ok(())
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        conflict_key: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();
        for row in rows {
            let conflict_value = row.get(conflict_key).and_then(Value::as_str).map(str::to_string);
            let existing = entry.rows.iter().position(|r| {
                r.get(conflict_key).and_then(Value::as_str).map(str::to_string) == conflict_value
            });
            match existing {
                Some(index) => {
                    if let Some(key) = entry.violates_unique(&row, Some(index)) {
                        return Err(StoreError::Constraint {
                            table: table.to_string(),
                            columns: key.join(", "),
                        });
                    }
                    entry.rows[index] = row;
                }
                None => {
                    if let Some(key) = entry.violates_unique(&row, None) {
                        return Err(StoreError::Constraint {
                            table: table.to_string(),
                            columns: key.join(", "),
                        });
                    }
                    entry.rows.push(row);
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(entry) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = entry.rows.len();
        entry.rows.retain(|row| !filter.matches(row));
        Ok((before - entry.rows.len()) as u64)
    }
}
