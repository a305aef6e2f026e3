//! Background worker for the catalog.
//!
//! Drains the task outbox on a fixed interval and runs the dirty-rating sweep
//! on its own interval. In batched mode the sweep is how ratings reach the
//! index; in immediate mode it picks up products whose reindex task was
//! dropped.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument};

use product_search_pipeline::{BatchSweep, TaskRunner};

/// Worker that runs outbox tasks and rating sweeps until shut down.
pub struct Worker {
    runner: TaskRunner,
    sweep: BatchSweep,
    poll_interval: Duration,
    sweep_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl Worker {
    /// Create a new worker.
    pub fn new(
        runner: TaskRunner,
        sweep: BatchSweep,
        poll_interval: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            runner,
            sweep,
            poll_interval,
            sweep_interval,
            shutdown_tx,
        }
    }

    /// Run the worker.
    ///
    /// Blocks until a shutdown signal is received, then drains the outbox
    /// one last time.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            sweep_interval_ms = self.sweep_interval.as_millis() as u64,
            "Starting catalog worker"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep_tick = interval(self.sweep_interval);
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if let Err(e) = self.runner.run_pending().await {
                        error!(error = %e, "Failed to run pending tasks");
                    }
                }
                _ = sweep_tick.tick() => {
                    match self.sweep.sweep().await {
                        Ok(report) if report.examined > 0 => info!(
                            examined = report.examined,
                            reindexed = report.reindexed.len(),
                            skipped = report.skipped,
                            "Rating sweep finished"
                        ),
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Rating sweep failed"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        // Run whatever the last tick left behind
        match self.runner.drain().await {
            Ok(report) => info!(
                succeeded = report.succeeded,
                dropped = report.dropped,
                failed = report.failed,
                "Drained task outbox"
            ),
            Err(e) => error!(error = %e, "Failed to drain task outbox"),
        }

        info!("Worker shutdown complete");
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use product_search_pipeline::{
        CatalogService, RatingReconciler, RawParams, ReconcileMode, TaskRunnerConfig,
    };
    use product_search_repository::{
        InMemoryRecordStore, InMemorySearchIndex, RecordStore, SearchIndexClient,
    };

    fn book(pid: &str) -> RawParams {
        [
            ("pid", pid),
            ("name", "Dune"),
            ("description", "Desert planet"),
            ("category", "books"),
            ("price", "9.5"),
            ("publisher", "Chilton"),
            ("pages", "412"),
            ("author", "Frank Herbert"),
            ("title", "Dune"),
            ("isbn", "9780441013593"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[tokio::test]
    async fn test_worker_reconciles_batched_ratings() {
        let store = InMemoryRecordStore::new();
        let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
        let index = Arc::new(SearchIndexClient::new(Box::new(InMemorySearchIndex::new())));
        let catalog = Arc::new(CatalogService::new(shared.clone(), index.clone()));
        let reconciler = Arc::new(RatingReconciler::new(
            shared.clone(),
            index.clone(),
            ReconcileMode::Batched,
        ));

        catalog.create_or_update(&book("dune")).await.unwrap();
        reconciler
            .submit_review("dune", None, 5, "classic")
            .await
            .unwrap();

        let worker = Worker::new(
            TaskRunner::new(shared.clone(), catalog.clone(), reconciler.clone()),
            BatchSweep::new(shared.clone(), index.clone()),
            Duration::from_millis(5),
            Duration::from_millis(20),
        );

        tokio::join!(worker.run(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            worker.shutdown();
        });

        let product = store.get_product("dune").await.unwrap().unwrap();
        assert_eq!(product.avg_rating, 5.0);
        assert!(!product.needs_review_reindex);
        let doc = index.get("dune").await.unwrap().unwrap();
        assert_eq!(doc.avg_rating(), Some(5.0));
    }

    #[tokio::test]
    async fn test_shutdown_drains_outbox() {
        let store = InMemoryRecordStore::new();
        let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
        let index = Arc::new(SearchIndexClient::new(Box::new(InMemorySearchIndex::new())));
        let catalog = Arc::new(CatalogService::new(shared.clone(), index.clone()));
        let reconciler = Arc::new(RatingReconciler::new(
            shared.clone(),
            index.clone(),
            ReconcileMode::Immediate,
        ));

        catalog.create_or_update(&book("dune")).await.unwrap();

        let worker = Worker::new(
            TaskRunner::new(shared.clone(), catalog.clone(), reconciler.clone()),
            BatchSweep::new(shared.clone(), index.clone()),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        );

        tokio::join!(worker.run(), async {
            // Let the first immediate tick pass before queueing work
            tokio::time::sleep(Duration::from_millis(20)).await;
            reconciler
                .submit_review("dune", None, 2, "slow")
                .await
                .unwrap();
            worker.shutdown();
        });

        let product = store.get_product("dune").await.unwrap().unwrap();
        assert_eq!(product.avg_rating, 2.0);
        assert_eq!(
            index.get("dune").await.unwrap().unwrap().avg_rating(),
            Some(2.0)
        );
    }

    #[tokio::test]
    async fn test_sweep_recovers_dropped_reindex_in_immediate_mode() {
        let store = InMemoryRecordStore::new();
        let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
        let memory_index = InMemorySearchIndex::new();
        let index = Arc::new(SearchIndexClient::new(Box::new(memory_index.clone())));
        let catalog = Arc::new(CatalogService::new(shared.clone(), index.clone()));
        let reconciler = Arc::new(RatingReconciler::new(
            shared.clone(),
            index.clone(),
            ReconcileMode::Immediate,
        ));
        let runner = TaskRunner::with_config(
            shared.clone(),
            catalog.clone(),
            reconciler.clone(),
            TaskRunnerConfig {
                batch_size: 10,
                max_attempts: 1,
            },
        );

        catalog.create_or_update(&book("dune")).await.unwrap();
        reconciler
            .submit_review("dune", None, 4, "dense")
            .await
            .unwrap();

        // The index is down long enough for the reindex task to be dropped.
        memory_index.set_fail_writes(true);
        runner.drain().await.unwrap();
        assert!(store.pending_tasks(10).await.unwrap().is_empty());
        assert!(store.get_product("dune").await.unwrap().unwrap().needs_review_reindex);
        memory_index.set_fail_writes(false);

        let worker = Worker::new(
            runner,
            BatchSweep::new(shared.clone(), index.clone()),
            Duration::from_millis(5),
            Duration::from_millis(20),
        );
        tokio::join!(worker.run(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            worker.shutdown();
        });

        assert!(!store.get_product("dune").await.unwrap().unwrap().needs_review_reindex);
        assert_eq!(
            index.get("dune").await.unwrap().unwrap().avg_rating(),
            Some(4.0)
        );
    }
}
