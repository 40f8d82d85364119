//! Bounded worker pool: spawns workers over a shared task queue and
//! collects their results.

use crate::config::{SourceConfig, TargetConfig};
use crate::error::Result;
use crate::extract::{ExaplusExtractor, Extractor};
use crate::load::{Loader, PgLoader};
use crate::orchestrator::MigrationStats;
use crate::task::{MigrationTask, TaskMessage, TaskResult};
use crate::worker::Worker;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Factory for per-worker source and target clients. Every worker gets its
/// own extractor and loader so no connection is ever shared across tasks
/// running concurrently.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    type Extractor: Extractor + 'static;
    type Loader: Loader + 'static;

    async fn extractor(&self) -> Result<Self::Extractor>;
    async fn loader(&self) -> Result<Self::Loader>;
}

/// Production factory: exaplus on the source side, a dedicated PostgreSQL
/// connection on the target side.
pub struct ExaplusPgFactory {
    source: SourceConfig,
    target: TargetConfig,
}

impl ExaplusPgFactory {
    pub fn new(source: SourceConfig, target: TargetConfig) -> Self {
        Self { source, target }
    }
}

#[async_trait]
impl ClientFactory for ExaplusPgFactory {
    type Extractor = ExaplusExtractor;
    type Loader = PgLoader;

    async fn extractor(&self) -> Result<ExaplusExtractor> {
        Ok(ExaplusExtractor::new(self.source.clone()))
    }

    async fn loader(&self) -> Result<PgLoader> {
        PgLoader::connect(&self.target).await
    }
}

/// Run the full task list through a pool of `workers` workers and collect
/// every result, recording each into `stats` as it arrives.
///
/// The queue is loaded up front: all tasks first, then one poison task per
/// worker, so each worker drains real work before seeing its stop message.
/// If the pool ends with fewer results than tasks (workers died without
/// reporting) the missing tasks are counted as errors, unless the job was
/// cancelled.
pub async fn run_pool<F: ClientFactory>(
    factory: Arc<F>,
    tasks: Vec<MigrationTask>,
    workers: usize,
    cancel: CancellationToken,
    stats: &mut MigrationStats,
) -> Vec<TaskResult> {
    let total = tasks.len();
    let (task_tx, task_rx) = async_channel::bounded::<TaskMessage>(total + workers);
    let (result_tx, mut result_rx) = mpsc::channel::<TaskResult>(workers.max(1) * 2);

    // The queue has capacity for everything, so these sends never block.
    for task in tasks {
        let _ = task_tx.send(TaskMessage::Run(task)).await;
    }
    for _ in 0..workers {
        let _ = task_tx.send(TaskMessage::Shutdown).await;
    }
    drop(task_tx);

    info!("Starting {} workers for {} tasks", workers, total);

    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let factory = Arc::clone(&factory);
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let cancel = cancel.clone();

        handles.push(tokio::spawn(async move {
            let extractor = match factory.extractor().await {
                Ok(e) => e,
                Err(e) => {
                    error!("Worker {}: source client failed: {}", id, e);
                    return;
                }
            };
            let loader = match factory.loader().await {
                Ok(l) => l,
                Err(e) => {
                    error!("Worker {}: target connection failed: {}", id, e);
                    return;
                }
            };
            match Worker::new(id, extractor, loader, task_rx, result_tx, cancel) {
                Ok(worker) => worker.run().await,
                Err(e) => error!("Worker {}: staging setup failed: {}", id, e),
            }
        }));
    }
    drop(result_tx);

    let mut results = Vec::with_capacity(total);
    while results.len() < total {
        match result_rx.recv().await {
            Some(result) => {
                stats.record(&result);
                results.push(result);
            }
            // All senders gone: every worker has exited.
            None => break,
        }
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Worker task panicked: {}", e);
        }
    }

    let missing = total - results.len();
    if missing > 0 && !cancel.is_cancelled() {
        error!("{} tasks were never processed; counting them as errors", missing);
        stats.errors += missing as u64;
    } else if missing > 0 {
        warn!("{} tasks skipped due to cancellation", missing);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use crate::testing::{MockExtractor, MockLoader};

    struct MockFactory {
        extractor: MockExtractor,
        loader: MockLoader,
    }

    #[async_trait]
    impl ClientFactory for MockFactory {
        type Extractor = MockExtractor;
        type Loader = MockLoader;

        async fn extractor(&self) -> Result<MockExtractor> {
            Ok(self.extractor.clone())
        }

        async fn loader(&self) -> Result<MockLoader> {
            Ok(self.loader.clone())
        }
    }

    fn tasks_for(table: &str, count: usize, rows: i64) -> Vec<MigrationTask> {
        (0..count)
            .map(|i| MigrationTask {
                schema: "retail".to_string(),
                table: table.to_string(),
                offset: i as i64 * rows,
                limit: Some(rows),
                truncate: i == 0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pool_processes_all_tasks_and_counts_match() {
        let loader = MockLoader::new();
        let factory = Arc::new(MockFactory {
            extractor: MockExtractor::new(10),
            loader: loader.clone(),
        });

        let tasks = tasks_for("orders", 10, 10);
        let mut stats = MigrationStats::default();
        let results = run_pool(
            factory,
            tasks,
            4,
            CancellationToken::new(),
            &mut stats,
        )
        .await;

        assert_eq!(results.len(), 10);
        assert_eq!(stats.success, 10);
        assert_eq!(stats.errors, 0);

        // Everything exported was imported.
        let exported: u64 = results.iter().map(|r| r.exported_rows).sum();
        let imported: u64 = results.iter().map(|r| r.imported_rows).sum();
        assert_eq!(exported, 100);
        assert_eq!(imported, exported);
        assert_eq!(loader.total_loaded(), 100);
    }

    #[tokio::test]
    async fn test_truncate_runs_once_per_table() {
        let loader = MockLoader::new();
        let factory = Arc::new(MockFactory {
            extractor: MockExtractor::new(5),
            loader: loader.clone(),
        });

        let mut tasks = tasks_for("orders", 6, 5);
        tasks.extend(tasks_for("customers", 4, 5));
        let mut stats = MigrationStats::default();
        let results = run_pool(
            factory,
            tasks,
            3,
            CancellationToken::new(),
            &mut stats,
        )
        .await;

        assert_eq!(results.len(), 10);
        let mut truncated = loader.truncate_calls();
        truncated.sort();
        assert_eq!(truncated, vec!["retail.customers", "retail.orders"]);
    }

    #[tokio::test]
    async fn test_failed_export_surfaces_as_error_result() {
        let factory = Arc::new(MockFactory {
            extractor: MockExtractor::new(5).failing_on("logs"),
            loader: MockLoader::new(),
        });

        let mut tasks = tasks_for("orders", 3, 5);
        tasks.extend(tasks_for("logs", 2, 5));
        let mut stats = MigrationStats::default();
        let results = run_pool(
            factory,
            tasks,
            2,
            CancellationToken::new(),
            &mut stats,
        )
        .await;

        assert_eq!(results.len(), 5);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.success, 3);

        let failed: Vec<_> = results
            .iter()
            .filter(|r| r.status == TaskStatus::Error)
            .collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|r| r.table == "logs" && r.imported_rows == 0));
    }

    #[tokio::test]
    async fn test_failed_load_surfaces_as_error_result() {
        let factory = Arc::new(MockFactory {
            extractor: MockExtractor::new(5),
            loader: MockLoader::new().failing_on("orders"),
        });

        let mut stats = MigrationStats::default();
        let results = run_pool(
            factory,
            tasks_for("orders", 2, 5),
            2,
            CancellationToken::new(),
            &mut stats,
        )
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(stats.errors, 2);
        assert!(results.iter().all(|r| r.status == TaskStatus::Error));
    }

    #[tokio::test]
    async fn test_rerun_with_truncate_yields_same_final_row_counts() {
        let loader = MockLoader::new();
        let factory = Arc::new(MockFactory {
            extractor: MockExtractor::new(5),
            loader: loader.clone(),
        });

        // One worker keeps FIFO order, so the truncate-flagged offset-0
        // task always runs before the appends.
        let tasks = tasks_for("orders", 4, 5);

        let mut stats = MigrationStats::default();
        run_pool(
            Arc::clone(&factory),
            tasks.clone(),
            1,
            CancellationToken::new(),
            &mut stats,
        )
        .await;
        assert_eq!(loader.rows_in("retail", "orders"), 20);

        // Re-running the same job replaces rather than appends.
        let mut stats = MigrationStats::default();
        run_pool(factory, tasks, 1, CancellationToken::new(), &mut stats).await;
        assert_eq!(loader.rows_in("retail", "orders"), 20);
        assert_eq!(loader.truncate_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_pool_terminates_without_counting_errors() {
        let factory = Arc::new(MockFactory {
            extractor: MockExtractor::new(5),
            loader: MockLoader::new(),
        });

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut stats = MigrationStats::default();
        let results = run_pool(
            factory,
            tasks_for("orders", 8, 5),
            2,
            cancel,
            &mut stats,
        )
        .await;

        // Workers may drain a few tasks before observing the signal, but
        // the pool must terminate and skipped tasks are not errors.
        assert!(results.len() <= 8);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_empty_task_list_completes_immediately() {
        let factory = Arc::new(MockFactory {
            extractor: MockExtractor::new(5),
            loader: MockLoader::new(),
        });

        let mut stats = MigrationStats::default();
        let results = run_pool(
            factory,
            Vec::new(),
            4,
            CancellationToken::new(),
            &mut stats,
        )
        .await;

        assert!(results.is_empty());
        assert_eq!(stats.errors, 0);
    }
}
