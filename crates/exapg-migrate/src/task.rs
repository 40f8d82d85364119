//! Migration task planning and per-task result types.
//!
//! A [`MigrationTask`] is the unit of work consumed by workers: one
//! contiguous row range of one table. Tasks are produced exclusively by
//! [`plan_tasks`] and are immutable once enqueued.

use crate::extract::TableInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One unit of migration work: a contiguous row range of a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTask {
    /// Source schema name.
    pub schema: String,

    /// Table name.
    pub table: String,

    /// Row offset of this batch within the table.
    pub offset: i64,

    /// Number of rows in this batch (None = rest of the table, unbatched).
    pub limit: Option<i64>,

    /// Whether this task empties the target table before loading.
    /// At most one task per table carries this flag, always the offset-0 one.
    pub truncate: bool,
}

impl MigrationTask {
    /// Fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Message on the shared task queue. `Shutdown` is the poison task that
/// tells a worker to exit its loop.
#[derive(Debug, Clone)]
pub enum TaskMessage {
    Run(MigrationTask),
    Shutdown,
}

/// Outcome status of a completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Rows were imported.
    Success,
    /// The task completed without error but imported zero rows.
    Warning,
    /// Export or load failed; nothing was committed for this task.
    Error,
}

/// Outcome of one completed task, published by a worker to the collector.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Id of the worker that ran the task.
    pub worker_id: usize,

    /// Source schema name.
    pub schema: String,

    /// Table name.
    pub table: String,

    /// Row offset of the batch.
    pub offset: i64,

    /// Batch size (None for whole-table tasks).
    pub limit: Option<i64>,

    /// Rows written to the staging artifact.
    pub exported_rows: u64,

    /// Rows reported by the target's bulk-load protocol.
    pub imported_rows: u64,

    /// Wall time spent in the export step.
    pub export_duration: Duration,

    /// Wall time spent in the load step.
    pub import_duration: Duration,

    /// Final status.
    pub status: TaskStatus,

    /// Error or warning detail, if any.
    pub message: Option<String>,
}

impl TaskResult {
    /// Fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Partition a table into migration tasks.
///
/// Small tables (`row_count <= batch_size`) and jobs with batching disabled
/// (`batch_size <= 0`) yield a single whole-table task. Large tables are
/// split into `ceil(row_count / batch_size)` contiguous, non-overlapping
/// ranges covering `[0, row_count)`, with the last range shortened to the
/// remainder.
///
/// When `truncate_policy` is set, exactly the offset-0 task carries the
/// truncate flag, so the target table is emptied by at most one task no
/// matter which worker picks it up first.
pub fn plan_tasks(table: &TableInfo, batch_size: i64, truncate_policy: bool) -> Vec<MigrationTask> {
    if table.row_count <= batch_size || batch_size <= 0 {
        return vec![MigrationTask {
            schema: table.schema.clone(),
            table: table.name.clone(),
            offset: 0,
            limit: None,
            truncate: truncate_policy,
        }];
    }

    let mut tasks = Vec::with_capacity((table.row_count / batch_size + 1) as usize);
    let mut offset = 0;
    while offset < table.row_count {
        let limit = batch_size.min(table.row_count - offset);
        tasks.push(MigrationTask {
            schema: table.schema.clone(),
            table: table.name.clone(),
            offset,
            limit: Some(limit),
            truncate: truncate_policy && offset == 0,
        });
        offset += batch_size;
    }
    tasks
}
