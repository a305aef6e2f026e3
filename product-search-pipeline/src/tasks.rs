//! Outbox task runner.
//!
//! Executes tasks committed to the record store's outbox. Delivery is at
//! least once: a task is acknowledged only after it ran, so every task
//! handler is idempotent.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::CatalogService;
use crate::errors::CatalogError;
use crate::reconciler::RatingReconciler;
use product_search_repository::RecordStore;
use product_search_shared::{OutboxEntry, Task};

/// Configuration for the task runner.
#[derive(Debug, Clone)]
pub struct TaskRunnerConfig {
    /// Number of tasks fetched per poll.
    pub batch_size: usize,
    /// Failed deliveries after which a task is dropped.
    pub max_attempts: u32,
}

impl Default for TaskRunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_attempts: 10,
        }
    }
}

/// Outcome of one pass over the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskRunReport {
    pub succeeded: usize,
    /// Tasks removed without success: missing records or too many attempts.
    pub dropped: usize,
    /// Tasks left in the outbox for another attempt.
    pub failed: usize,
}

impl TaskRunReport {
    pub fn processed(&self) -> usize {
        self.succeeded + self.dropped + self.failed
    }

    fn absorb(&mut self, other: TaskRunReport) {
        self.succeeded += other.succeeded;
        self.dropped += other.dropped;
        self.failed += other.failed;
    }
}

/// Runs outbox tasks against the catalog services.
pub struct TaskRunner {
    store: Arc<dyn RecordStore>,
    catalog: Arc<CatalogService>,
    reconciler: Arc<RatingReconciler>,
    config: TaskRunnerConfig,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        catalog: Arc<CatalogService>,
        reconciler: Arc<RatingReconciler>,
    ) -> Self {
        Self::with_config(store, catalog, reconciler, TaskRunnerConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn RecordStore>,
        catalog: Arc<CatalogService>,
        reconciler: Arc<RatingReconciler>,
        config: TaskRunnerConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            reconciler,
            config,
        }
    }

    /// Execute one task.
    pub async fn execute(&self, task: &Task) -> Result<(), CatalogError> {
        match task {
            Task::ApplyReview { review_id } => {
                self.reconciler.apply_review(*review_id).await?;
            }
            Task::ReindexRating { product_id } => {
                self.reconciler.reindex_product_rating(product_id).await?;
            }
            Task::DeleteReviews { product_id } => {
                if self.recreated(product_id).await? {
                    return Ok(());
                }
                self.catalog.delete_reviews(product_id).await?;
            }
            Task::DeleteDocument { product_id, doc_id } => {
                if self.recreated(product_id).await? {
                    return Ok(());
                }
                self.catalog.remove_document(doc_id).await?;
            }
        }
        Ok(())
    }

    /// A delete cascade is stale once a product with the same id exists again.
    async fn recreated(&self, product_id: &str) -> Result<bool, CatalogError> {
        if self.store.get_product(product_id).await?.is_some() {
            info!(pid = %product_id, "Product was re-created, skipping delete cascade");
            return Ok(true);
        }
        Ok(false)
    }

    /// Run up to one batch of pending tasks, oldest first.
    #[instrument(skip(self))]
    pub async fn run_pending(&self) -> Result<TaskRunReport, CatalogError> {
        let entries = self.store.pending_tasks(self.config.batch_size).await?;
        let mut report = TaskRunReport::default();

        for entry in entries {
            match self.execute(&entry.task).await {
                Ok(()) => {
                    debug!(task_id = %entry.id, kind = entry.task.kind(), "Task completed");
                    self.store.ack_task(entry.id).await?;
                    report.succeeded += 1;
                }
                Err(CatalogError::NotFound(what)) => {
                    error!(
                        task_id = %entry.id,
                        kind = entry.task.kind(),
                        missing = %what,
                        "Dropping task for missing record"
                    );
                    self.store.ack_task(entry.id).await?;
                    report.dropped += 1;
                }
                Err(e) => {
                    if self.record_failure(&entry, &e).await? {
                        report.dropped += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        if report.processed() > 0 {
            info!(
                succeeded = report.succeeded,
                dropped = report.dropped,
                failed = report.failed,
                "Processed outbox tasks"
            );
        }
        Ok(report)
    }

    /// Run batches until the outbox is empty or a batch makes no progress.
    pub async fn drain(&self) -> Result<TaskRunReport, CatalogError> {
        let mut total = TaskRunReport::default();
        loop {
            let report = self.run_pending().await?;
            total.absorb(report);
            if report.succeeded + report.dropped == 0 {
                break;
            }
        }
        Ok(total)
    }

    /// Returns true when the task was dropped for exceeding its attempts.
    async fn record_failure(&self, entry: &OutboxEntry, err: &CatalogError) -> Result<bool, CatalogError> {
        let attempts = entry.attempts + 1;
        if attempts >= self.config.max_attempts {
            error!(
                task_id = %entry.id,
                kind = entry.task.kind(),
                attempts = attempts,
                error = %err,
                "Dropping task after repeated failures"
            );
            self.ack(entry.id).await?;
            return Ok(true);
        }

        warn!(
            task_id = %entry.id,
            kind = entry.task.kind(),
            attempts = attempts,
            error = %err,
            "Task failed, will retry"
        );
        self.store.record_task_failure(entry.id).await?;
        Ok(false)
    }

    async fn ack(&self, id: Uuid) -> Result<(), CatalogError> {
        Ok(self.store.ack_task(id).await?)
    }
}
