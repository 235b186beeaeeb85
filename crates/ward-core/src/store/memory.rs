//! In-process store backend.
//!
//! Holds every table in memory behind a single async `RwLock`. Each operation takes the lock
//! for its full duration, so a filtered `update` is atomic with respect to concurrent callers.

use super::{apply_delete, apply_update, reject_unfiltered, Filter, RecordStore, Row, Table};
use crate::error::StoreResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<Table, Vec<Row>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `rows` to `table` without going through the [`RecordStore`] interface.
    pub async fn seed(&self, table: Table, rows: impl IntoIterator<Item = Row>) {
        self.tables
            .write()
            .await
            .entry(table)
            .or_default()
            .extend(rows);
    }

    /// Returns a copy of every row currently in `table`.
    pub async fn rows(&self, table: Table) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn select(&self, table: Table, filter: &Filter) -> StoreResult<Vec<Row>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .entry(table)
            .or_default()
            .extend(rows);
        Ok(())
    }

    async fn update(&self, table: Table, filter: &Filter, patch: &Row) -> StoreResult<u64> {
        reject_unfiltered("update", table, filter)?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(&table)
            .map(|rows| apply_update(rows, filter, patch))
            .unwrap_or(0))
    }

    async fn delete(&self, table: Table, filter: &Filter) -> StoreResult<u64> {
        reject_unfiltered("delete", table, filter)?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(&table)
            .map(|rows| apply_delete(rows, filter))
            .unwrap_or(0))
    }
}
