//! Shared test doubles for the extractor and loader seams.

use crate::error::{MigrateError, Result};
use crate::extract::{ColumnInfo, Extractor, TableFilter, TableInfo};
use crate::load::Loader;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Extractor double that writes a fixed number of CSV rows per export.
#[derive(Clone)]
pub struct MockExtractor {
    rows_per_export: u64,
    failing_tables: HashSet<String>,
    tables: Vec<TableInfo>,
}

impl MockExtractor {
    pub fn new(rows_per_export: u64) -> Self {
        Self {
            rows_per_export,
            failing_tables: HashSet::new(),
            tables: Vec::new(),
        }
    }

    /// Make exports of the named table fail.
    pub fn failing_on(mut self, table: &str) -> Self {
        self.failing_tables.insert(table.to_string());
        self
    }

    /// Seed the catalog returned by `list_tables`.
    pub fn with_tables(mut self, tables: Vec<TableInfo>) -> Self {
        self.tables = tables;
        self
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<TableInfo>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| filter.include.is_empty() || filter.include.contains(&t.name))
            .filter(|t| !filter.exclude.contains(&t.name))
            .cloned()
            .collect())
    }

    async fn column_list(&self, _schema: &str, _table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(vec![
            ColumnInfo {
                name: "ID".to_string(),
                data_type: "DECIMAL(18,0)".to_string(),
            },
            ColumnInfo {
                name: "NAME".to_string(),
                data_type: "VARCHAR(100)".to_string(),
            },
        ])
    }

    async fn row_count(&self, _schema: &str, table: &str) -> Result<i64> {
        Ok(self
            .tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.row_count)
            .unwrap_or(self.rows_per_export as i64))
    }

    async fn export_range(
        &self,
        _schema: &str,
        table: &str,
        offset: i64,
        _limit: Option<i64>,
        staging: &Path,
    ) -> Result<u64> {
        if self.failing_tables.contains(table) {
            return Err(MigrateError::extract(table, "simulated export failure"));
        }
        let mut body = String::new();
        for i in 0..self.rows_per_export {
            body.push_str(&format!("{},row_{}\n", offset as u64 + i, i));
        }
        tokio::fs::write(staging, body).await?;
        Ok(self.rows_per_export)
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct LoaderState {
    truncated: Vec<String>,
    schemas: Vec<String>,
    /// Number of files present in the staging directory at each load call.
    artifacts_seen: Vec<usize>,
    loaded_rows: u64,
    /// Simulated target contents: qualified table name to row count.
    /// Truncation resets the count; loads append to it.
    table_rows: HashMap<String, u64>,
    failing_tables: HashSet<String>,
}

/// Loader double that counts the lines of each staging artifact it is
/// handed. Cloning shares the recorded state, so tests can keep a handle
/// after moving the loader into a worker.
#[derive(Clone, Default)]
pub struct MockLoader {
    state: Arc<Mutex<LoaderState>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads into the named table fail.
    pub fn failing_on(self, table: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_tables
            .insert(table.to_string());
        self
    }

    /// Qualified names of tables that were truncated, in call order.
    pub fn truncate_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().truncated.clone()
    }

    /// Schemas that `ensure_schema` was called for, in call order.
    pub fn schema_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().schemas.clone()
    }

    /// Staging-directory file counts observed at each load.
    pub fn artifacts_seen(&self) -> Vec<usize> {
        self.state.lock().unwrap().artifacts_seen.clone()
    }

    /// Total rows accepted across all loads.
    pub fn total_loaded(&self) -> u64 {
        self.state.lock().unwrap().loaded_rows
    }

    /// Current row count of the simulated target table.
    pub fn rows_in(&self, schema: &str, table: &str) -> u64 {
        self.state
            .lock()
            .unwrap()
            .table_rows
            .get(&format!("{}.{}", schema, table))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Loader for MockLoader {
    async fn ensure_schema(&mut self, schema: &str) -> Result<()> {
        self.state.lock().unwrap().schemas.push(schema.to_string());
        Ok(())
    }

    async fn table_exists(&mut self, _schema: &str, _table: &str) -> Result<bool> {
        Ok(true)
    }

    async fn truncate_table(&mut self, schema: &str, table: &str) -> Result<()> {
        let key = format!("{}.{}", schema, table);
        let mut state = self.state.lock().unwrap();
        state.truncated.push(key.clone());
        state.table_rows.insert(key, 0);
        Ok(())
    }

    async fn load_file(&mut self, schema: &str, table: &str, staging: &Path) -> Result<u64> {
        if self.state.lock().unwrap().failing_tables.contains(table) {
            return Err(MigrateError::load(table, "simulated load failure"));
        }

        let siblings = std::fs::read_dir(staging.parent().unwrap())?.count();
        let body = tokio::fs::read_to_string(staging).await?;
        let rows = body.lines().count() as u64;

        let mut state = self.state.lock().unwrap();
        state.artifacts_seen.push(siblings);
        state.loaded_rows += rows;
        *state
            .table_rows
            .entry(format!("{}.{}", schema, table))
            .or_insert(0) += rows;
        Ok(rows)
    }

    async fn probe(&mut self) -> Result<()> {
        Ok(())
    }
}
