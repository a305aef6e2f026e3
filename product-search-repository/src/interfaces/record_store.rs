//! Record store trait definitions.
//!
//! The record store is the transactional side of the catalog. It holds
//! `Product` and `Review` records and the outbox of tasks scheduled by
//! committed transactions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StoreError;
use product_search_shared::{OutboxEntry, Product, Review, ReviewId, Task};

/// A single serializable transaction.
///
/// Reads are tracked; `commit` fails with [`StoreError::Conflict`] if any
/// record read through the transaction was changed by another commit in the
/// meantime, in which case none of the buffered writes or tasks take effect.
/// Dropping a transaction without committing discards it.
#[async_trait]
pub trait RecordTransaction: Send {
    /// Read a product, observing any write buffered in this transaction.
    async fn get_product(&mut self, pid: &str) -> Result<Option<Product>, StoreError>;

    /// Read a review, observing any write buffered in this transaction.
    async fn get_review(&mut self, id: ReviewId) -> Result<Option<Review>, StoreError>;

    /// Buffer an insert or replace of a product.
    fn put_product(&mut self, product: Product);

    /// Buffer an insert or replace of a review.
    fn put_review(&mut self, review: Review);

    /// Buffer the removal of a product.
    fn delete_product(&mut self, pid: &str);

    /// Schedule a task that is delivered only if this transaction commits.
    fn enqueue(&mut self, task: Task);

    /// Atomically apply buffered writes and tasks.
    async fn commit(&mut self) -> Result<(), StoreError>;
}

/// Abstracts the transactional record store.
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Start a new transaction.
    async fn begin(&self) -> Result<Box<dyn RecordTransaction>, StoreError>;

    /// Read a product outside any transaction.
    async fn get_product(&self, pid: &str) -> Result<Option<Product>, StoreError>;

    /// Read a review outside any transaction.
    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>, StoreError>;

    /// Reserve a fresh review id.
    async fn allocate_id(&self) -> Result<ReviewId, StoreError>;

    /// Ids of every product whose document is flagged as stale, ascending.
    async fn dirty_product_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Every review referencing the product, oldest first.
    async fn reviews_for_product(&self, pid: &str) -> Result<Vec<Review>, StoreError>;

    /// Remove every review referencing the product. Returns how many were removed.
    async fn delete_reviews_for_product(&self, pid: &str) -> Result<usize, StoreError>;

    /// Up to `limit` committed tasks, oldest first.
    async fn pending_tasks(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError>;

    /// Remove a delivered task. Unknown ids are ignored.
    async fn ack_task(&self, id: Uuid) -> Result<(), StoreError>;

    /// Record a failed delivery; the task stays in the outbox.
    async fn record_task_failure(&self, id: Uuid) -> Result<(), StoreError>;
}
