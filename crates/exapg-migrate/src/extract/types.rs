//! Source metadata types.

use crate::config::MigrationConfig;
use serde::{Deserialize, Serialize};

/// Table metadata read once from the source catalog per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Ordered column definitions.
    pub columns: Vec<ColumnInfo>,

    /// Authoritative row count.
    pub row_count: i64,
}

impl TableInfo {
    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Ordered column names for the export projection.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Rendered data type (e.g. "DECIMAL(18,0)", "VARCHAR(100)").
    pub data_type: String,
}

/// Table selection filters applied when listing source tables.
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    /// Restrict to a single schema (None = all non-system schemas).
    pub schema: Option<String>,

    /// Exact table names to include (empty = all).
    pub include: Vec<String>,

    /// Exact table names to exclude.
    pub exclude: Vec<String>,
}

impl TableFilter {
    /// Build a filter from the migration configuration.
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            schema: config.schema.clone(),
            include: config.include_tables.clone(),
            exclude: config.exclude_tables.clone(),
        }
    }
}
