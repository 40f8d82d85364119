//! Configuration type definitions with auto-tuning based on system resources.

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            cpu_cores: sys.cpus().len(),
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!("System resources: {} CPU cores", self.cpu_cores);
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (Exasol).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.migration = self.migration.with_auto_tuning(&resources);
        self
    }
}

/// Source database (Exasol) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "exasol" for now).
    #[serde(default = "default_exasol")]
    pub r#type: String,

    /// Exasol DSN in `user/password@host:port` form, passed to exaplus.
    pub dsn: String,

    /// Path to the exaplus client binary.
    #[serde(default = "default_exaplus")]
    pub exaplus_bin: String,
}

/// Target database (PostgreSQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "postgres" for now).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Number of parallel workers. Auto-tuned based on CPU cores if not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Rows per batch for large tables. `<= 0` disables batching.
    pub batch_size: i64,

    /// Restrict the migration to a single source schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Tables to include (exact names; empty = all).
    pub include_tables: Vec<String>,

    /// Tables to exclude (exact names).
    pub exclude_tables: Vec<String>,

    /// Truncate target tables before the first batch (default: true).
    pub truncate: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: default_batch_size(),
            schema: None,
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            truncate: true,
        }
    }
}

impl MigrationConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        // Workers: cores - 2, but at least 2 and at most 16
        if self.workers.is_none() {
            let workers = resources.cpu_cores.saturating_sub(2).clamp(2, 16);
            self.workers = Some(workers);
            info!("Auto-tuned config: workers={}", workers);
        }
        self
    }

    /// Effective worker count (with fallback default).
    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(4)
    }
}

// Default value functions for serde
fn default_exasol() -> String {
    "exasol".to_string()
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_exaplus() -> String {
    "exaplus".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_batch_size() -> i64 {
    100_000
}
