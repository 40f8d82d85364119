//! Migration worker: the per-task extract→load loop.
//!
//! Each worker owns one extractor client, one loader connection, and one
//! private staging directory. Workers pull tasks from the shared queue and
//! publish exactly one [`TaskResult`] per task; every task-level failure is
//! converted into an error result at the loop boundary, so a bad table never
//! takes down the pool.

use crate::error::Result;
use crate::extract::Extractor;
use crate::load::Loader;
use crate::task::{MigrationTask, TaskMessage, TaskResult, TaskStatus};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A single migration worker.
pub struct Worker<E, L> {
    id: usize,
    extractor: E,
    loader: L,
    staging: TempDir,
    tasks: async_channel::Receiver<TaskMessage>,
    results: mpsc::Sender<TaskResult>,
    cancel: CancellationToken,
}

impl<E: Extractor, L: Loader> Worker<E, L> {
    /// Create a worker with its own private staging directory.
    pub fn new(
        id: usize,
        extractor: E,
        loader: L,
        tasks: async_channel::Receiver<TaskMessage>,
        results: mpsc::Sender<TaskResult>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let staging = tempfile::Builder::new()
            .prefix(&format!("exapg_worker_{}_", id))
            .tempdir()?;

        Ok(Self {
            id,
            extractor,
            loader,
            staging,
            tasks,
            results,
            cancel,
        })
    }

    /// Path of this worker's staging directory.
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Run the worker loop until a poison task, a closed queue, or
    /// cancellation. Cancellation is cooperative: it is only observed at
    /// the next queue pop, never mid-task.
    pub async fn run(mut self) {
        info!("Worker {} started", self.id);

        loop {
            // Biased so a pending stop signal always wins over the queue.
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Worker {} observed stop signal", self.id);
                    break;
                }
                message = self.tasks.recv() => message,
            };

            match message {
                Ok(TaskMessage::Run(task)) => {
                    let result = self.process_task(&task).await;
                    if self.results.send(result).await.is_err() {
                        // Collector is gone; nothing left to report to.
                        break;
                    }
                }
                Ok(TaskMessage::Shutdown) => {
                    info!("Worker {} received stop task", self.id);
                    break;
                }
                Err(_) => break,
            }
        }

        info!("Worker {} finished", self.id);
        // Dropping `self.staging` releases the staging directory.
    }

    /// Process one task, always removing the staging artifact afterwards.
    async fn process_task(&mut self, task: &MigrationTask) -> TaskResult {
        info!(
            "Worker {}: migrating {} (offset: {}, limit: {:?})",
            self.id,
            task.full_name(),
            task.offset,
            task.limit
        );

        let staging = self.staging_path(task);
        let result = self.transfer(task, &staging).await;

        if let Err(e) = tokio::fs::remove_file(&staging).await {
            if staging.exists() {
                warn!(
                    "Worker {}: could not remove staging artifact {:?}: {}",
                    self.id, staging, e
                );
            }
        }

        result
    }

    async fn transfer(&mut self, task: &MigrationTask, staging: &Path) -> TaskResult {
        let export_start = Instant::now();
        let exported_rows = match self
            .extractor
            .export_range(&task.schema, &task.table, task.offset, task.limit, staging)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                return self.error_result(task, 0, export_start.elapsed(), Duration::ZERO, e);
            }
        };
        let export_duration = export_start.elapsed();

        debug!(
            "Worker {}: exported {} rows from {} in {:?}",
            self.id,
            exported_rows,
            task.full_name(),
            export_duration
        );

        let import_start = Instant::now();
        match self.load(task, staging).await {
            Ok(imported_rows) => {
                let status = if imported_rows > 0 {
                    TaskStatus::Success
                } else {
                    TaskStatus::Warning
                };
                TaskResult {
                    worker_id: self.id,
                    schema: task.schema.clone(),
                    table: task.table.clone(),
                    offset: task.offset,
                    limit: task.limit,
                    exported_rows,
                    imported_rows,
                    export_duration,
                    import_duration: import_start.elapsed(),
                    status,
                    message: (imported_rows == 0).then(|| "no rows imported".to_string()),
                }
            }
            Err(e) => {
                self.error_result(task, exported_rows, export_duration, import_start.elapsed(), e)
            }
        }
    }

    /// Prepare the target and stream the staging artifact in. The load
    /// itself runs in a single transaction inside the loader.
    async fn load(&mut self, task: &MigrationTask, staging: &Path) -> Result<u64> {
        self.loader.ensure_schema(&task.schema).await?;

        if task.truncate && self.loader.table_exists(&task.schema, &task.table).await? {
            self.loader.truncate_table(&task.schema, &task.table).await?;
        }

        self.loader
            .load_file(&task.schema, &task.table, staging)
            .await
    }

    fn error_result(
        &self,
        task: &MigrationTask,
        exported_rows: u64,
        export_duration: Duration,
        import_duration: Duration,
        error: crate::error::MigrateError,
    ) -> TaskResult {
        TaskResult {
            worker_id: self.id,
            schema: task.schema.clone(),
            table: task.table.clone(),
            offset: task.offset,
            limit: task.limit,
            exported_rows,
            imported_rows: 0,
            export_duration,
            import_duration,
            status: TaskStatus::Error,
            message: Some(error.to_string()),
        }
    }

    fn staging_path(&self, task: &MigrationTask) -> PathBuf {
        self.staging.path().join(format!(
            "{}_{}_{}_{}.csv",
            task.schema,
            task.table,
            task.offset,
            task.limit.unwrap_or(-1)
        ))
    }
}
