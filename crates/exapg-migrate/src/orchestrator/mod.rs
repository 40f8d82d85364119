//! Migration orchestration: table discovery, task planning, the worker
//! pool, and final job aggregation.

mod pool;

pub use pool::{run_pool, ClientFactory, ExaplusPgFactory};

use crate::config::Config;
use crate::error::Result;
use crate::extract::{ExaplusExtractor, Extractor, TableFilter, TableInfo};
use crate::load::{Loader, PgLoader};
use crate::task::{plan_tasks, TaskResult, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Running tallies over task results, updated as each result arrives.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MigrationStats {
    pub success: u64,
    pub warnings: u64,
    pub errors: u64,
    pub rows_exported: u64,
    pub rows_imported: u64,
}

impl MigrationStats {
    /// Record one task result, logging its outcome.
    pub fn record(&mut self, result: &TaskResult) {
        self.rows_exported += result.exported_rows;
        self.rows_imported += result.imported_rows;

        match result.status {
            TaskStatus::Success => {
                self.success += 1;
                info!(
                    "Completed {} (offset {}): {} rows exported in {:.1}s, {} imported in {:.1}s",
                    result.full_name(),
                    result.offset,
                    result.exported_rows,
                    result.export_duration.as_secs_f64(),
                    result.imported_rows,
                    result.import_duration.as_secs_f64()
                );
            }
            TaskStatus::Warning => {
                self.warnings += 1;
                warn!(
                    "Completed {} (offset {}) with no rows: {}",
                    result.full_name(),
                    result.offset,
                    result.message.as_deref().unwrap_or("no detail")
                );
            }
            TaskStatus::Error => {
                self.errors += 1;
                error!(
                    "Failed {} (offset {}): {}",
                    result.full_name(),
                    result.offset,
                    result.message.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}

/// Final, serializable outcome of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub run_id: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub tables_total: usize,
    pub tasks_total: usize,
    /// Sum of the discovered source row counts.
    pub rows_estimated: i64,
    pub rows_exported: u64,
    pub rows_imported: u64,
    pub success: u64,
    pub warnings: u64,
    pub errors: u64,
}

impl MigrationResult {
    /// True when every task completed without error and the run was not
    /// cancelled.
    pub fn is_success(&self) -> bool {
        self.status == "completed"
    }

    /// Pretty-printed JSON report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity status of one side of the migration.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub ok: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a `health-check` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub source: ComponentHealth,
    pub target: ComponentHealth,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.source.ok && self.target.ok
    }
}

/// Coordinates a full migration run end to end.
pub struct Orchestrator {
    config: Config,
    catalog: ExaplusExtractor,
    factory: Arc<ExaplusPgFactory>,
}

impl Orchestrator {
    /// Build an orchestrator without touching either database.
    pub fn new(config: Config) -> Self {
        let catalog = ExaplusExtractor::new(config.source.clone());
        let factory = Arc::new(ExaplusPgFactory::new(
            config.source.clone(),
            config.target.clone(),
        ));

        Self {
            config,
            catalog,
            factory,
        }
    }

    /// Build an orchestrator and verify both sides are reachable. A failed
    /// probe on either side is fatal before any work is planned.
    pub async fn connect(config: Config) -> Result<Self> {
        let orchestrator = Self::new(config);
        orchestrator.catalog.probe().await?;
        orchestrator.probe_target().await?;
        Ok(orchestrator)
    }

    /// Run the migration to completion (or cancellation) and return the
    /// aggregated result. Task-level failures never abort the run; they are
    /// tallied and reflected in the final status.
    pub async fn run(&self, cancel: CancellationToken) -> Result<MigrationResult> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        info!("Migration run {} started", run_id);

        let filter = TableFilter::from_config(&self.config.migration);
        let tables = discover_tables(&self.catalog, &filter).await?;
        if tables.is_empty() {
            warn!("No tables matched the configured filters");
        }

        let rows_estimated: i64 = tables.iter().map(|t| t.row_count).sum();

        let mut tasks = Vec::new();
        for table in &tables {
            tasks.extend(plan_tasks(
                table,
                self.config.migration.batch_size,
                self.config.migration.truncate,
            ));
        }
        let tasks_total = tasks.len();

        let workers = self.config.migration.get_workers().min(tasks_total.max(1));
        info!(
            "Planned {} tasks across {} tables ({} workers)",
            tasks_total,
            tables.len(),
            workers
        );

        let mut stats = MigrationStats::default();
        let results = run_pool(
            Arc::clone(&self.factory),
            tasks,
            workers,
            cancel.clone(),
            &mut stats,
        )
        .await;

        let status = if stats.errors > 0 {
            "failed"
        } else if cancel.is_cancelled() && results.len() < tasks_total {
            "cancelled"
        } else {
            "completed"
        };

        let result = MigrationResult {
            run_id,
            status: status.to_string(),
            started_at,
            completed_at: Utc::now(),
            duration_seconds: start.elapsed().as_secs_f64(),
            tables_total: tables.len(),
            tasks_total,
            rows_estimated,
            rows_exported: stats.rows_exported,
            rows_imported: stats.rows_imported,
            success: stats.success,
            warnings: stats.warnings,
            errors: stats.errors,
        };

        info!(
            "Migration run {} {}: {}/{} tasks succeeded, {} rows in {:.1}s",
            result.run_id,
            result.status,
            result.success,
            result.tasks_total,
            result.rows_imported,
            result.duration_seconds
        );
        Ok(result)
    }

    /// Probe both sides and report reachability with latency.
    pub async fn health_check(&self) -> HealthReport {
        let start = Instant::now();
        let source = match self.catalog.probe().await {
            Ok(()) => ComponentHealth {
                ok: true,
                latency_ms: start.elapsed().as_millis() as u64,
                error: None,
            },
            Err(e) => ComponentHealth {
                ok: false,
                latency_ms: start.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            },
        };

        let start = Instant::now();
        let target = match self.probe_target().await {
            Ok(()) => ComponentHealth {
                ok: true,
                latency_ms: start.elapsed().as_millis() as u64,
                error: None,
            },
            Err(e) => ComponentHealth {
                ok: false,
                latency_ms: start.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            },
        };

        HealthReport { source, target }
    }

    async fn probe_target(&self) -> Result<()> {
        let mut loader = PgLoader::connect(&self.config.target).await?;
        loader.probe().await
    }
}

/// Discover tables matching the filter, enriching each with its column
/// list and an authoritative row count. Discovery is serial; only the
/// transfer work itself is parallel.
pub async fn discover_tables<E: Extractor>(
    extractor: &E,
    filter: &TableFilter,
) -> Result<Vec<TableInfo>> {
    let mut tables = extractor.list_tables(filter).await?;

    for table in &mut tables {
        table.columns = extractor.column_list(&table.schema, &table.name).await?;
        table.row_count = extractor.row_count(&table.schema, &table.name).await?;
        info!(
            "Discovered {}: {} rows, {} columns",
            table.full_name(),
            table.row_count,
            table.columns.len()
        );
    }

    Ok(tables)
}
