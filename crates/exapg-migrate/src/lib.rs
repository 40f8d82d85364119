//! Exasol to PostgreSQL bulk data migration.
//!
//! The crate moves full tables out of Exasol (via the `exaplus` client's
//! CSV export) and into PostgreSQL (via `COPY FROM STDIN`), using a bounded
//! pool of workers that each own their own source client, target connection,
//! and staging directory. Large tables are partitioned into contiguous row
//! ranges so multiple workers can move one table concurrently.
//!
//! # Example
//!
//! ```no_run
//! use exapg_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> exapg_migrate::Result<()> {
//! let config = Config::load("config.yaml")?.with_auto_tuning();
//! let orchestrator = Orchestrator::connect(config).await?;
//! let result = orchestrator.run(CancellationToken::new()).await?;
//! println!("{}", result.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod orchestrator;
pub mod task;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use extract::{ColumnInfo, ExaplusExtractor, Extractor, TableFilter, TableInfo};
pub use load::{Loader, PgLoader};
pub use orchestrator::{
    ClientFactory, ExaplusPgFactory, HealthReport, MigrationResult, MigrationStats, Orchestrator,
};
pub use task::{plan_tasks, MigrationTask, TaskMessage, TaskResult, TaskStatus};
pub use worker::Worker;
