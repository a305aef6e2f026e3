//! In-memory record store with optimistic serializable transactions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::interfaces::{RecordStore, RecordTransaction};
use product_search_shared::{OutboxEntry, Product, Review, ReviewId, Task};

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    record: T,
}

#[derive(Debug, Default)]
struct StoreState {
    products: BTreeMap<String, Versioned<Product>>,
    reviews: BTreeMap<ReviewId, Versioned<Review>>,
    outbox: Vec<OutboxEntry>,
    next_id: ReviewId,
    /// Monotonic commit counter, used as the version of every write.
    clock: u64,
}

impl StoreState {
    fn product_version(&self, pid: &str) -> Option<u64> {
        self.products.get(pid).map(|v| v.version)
    }

    fn review_version(&self, id: ReviewId) -> Option<u64> {
        self.reviews.get(&id).map(|v| v.version)
    }
}

/// Record store kept entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of product records, active or not.
    pub async fn product_count(&self) -> usize {
        self.state.lock().await.products.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn begin(&self) -> Result<Box<dyn RecordTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction::new(self.state.clone())))
    }

    async fn get_product(&self, pid: &str) -> Result<Option<Product>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.products.get(pid).map(|v| v.record.clone()))
    }

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.reviews.get(&id).map(|v| v.record.clone()))
    }

    async fn allocate_id(&self) -> Result<ReviewId, StoreError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        Ok(state.next_id)
    }

    async fn dirty_product_ids(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .filter(|v| v.record.needs_review_reindex)
            .map(|v| v.record.pid.clone())
            .collect())
    }

    async fn reviews_for_product(&self, pid: &str) -> Result<Vec<Review>, StoreError> {
        let state = self.state.lock().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|v| v.record.product_id == pid)
            .map(|v| v.record.clone())
            .collect();
        reviews.sort_by(|a, b| a.date_added.cmp(&b.date_added).then(a.id.cmp(&b.id)));
        Ok(reviews)
    }

    async fn delete_reviews_for_product(&self, pid: &str) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.reviews.len();
        state.reviews.retain(|_, v| v.record.product_id != pid);
        Ok(before - state.reviews.len())
    }

    async fn pending_tasks(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.outbox.iter().take(limit).cloned().collect())
    }

    async fn ack_task(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.outbox.retain(|entry| entry.id != id);
        Ok(())
    }

    async fn record_task_failure(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.outbox.iter_mut().find(|entry| entry.id == id) {
            entry.attempts += 1;
        }
        Ok(())
    }
}

/// Buffered transaction over an [`InMemoryRecordStore`].
struct InMemoryTransaction {
    state: Arc<Mutex<StoreState>>,
    /// First observed version of every record read; `None` means absent.
    product_reads: HashMap<String, Option<u64>>,
    review_reads: HashMap<ReviewId, Option<u64>>,
    /// `None` marks a buffered delete.
    product_writes: HashMap<String, Option<Product>>,
    review_writes: HashMap<ReviewId, Review>,
    tasks: Vec<Task>,
}

impl InMemoryTransaction {
    fn new(state: Arc<Mutex<StoreState>>) -> Self {
        Self {
            state,
            product_reads: HashMap::new(),
            review_reads: HashMap::new(),
            product_writes: HashMap::new(),
            review_writes: HashMap::new(),
            tasks: Vec::new(),
        }
    }

    fn validate(&self, state: &StoreState) -> Result<(), StoreError> {
        for (pid, observed) in &self.product_reads {
            if state.product_version(pid) != *observed {
                return Err(StoreError::conflict(format!("product {} changed", pid)));
            }
        }
        for (id, observed) in &self.review_reads {
            if state.review_version(*id) != *observed {
                return Err(StoreError::conflict(format!("review {} changed", id)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordTransaction for InMemoryTransaction {
    async fn get_product(&mut self, pid: &str) -> Result<Option<Product>, StoreError> {
        if let Some(buffered) = self.product_writes.get(pid) {
            return Ok(buffered.clone());
        }
        let state = self.state.lock().await;
        let current = state.products.get(pid);
        self.product_reads
            .entry(pid.to_string())
            .or_insert_with(|| current.map(|v| v.version));
        Ok(current.map(|v| v.record.clone()))
    }

    async fn get_review(&mut self, id: ReviewId) -> Result<Option<Review>, StoreError> {
        if let Some(buffered) = self.review_writes.get(&id) {
            return Ok(Some(buffered.clone()));
        }
        let state = self.state.lock().await;
        let current = state.reviews.get(&id);
        self.review_reads
            .entry(id)
            .or_insert_with(|| current.map(|v| v.version));
        Ok(current.map(|v| v.record.clone()))
    }

    fn put_product(&mut self, product: Product) {
        self.product_writes.insert(product.pid.clone(), Some(product));
    }

    fn put_review(&mut self, review: Review) {
        self.review_writes.insert(review.id, review);
    }

    fn delete_product(&mut self, pid: &str) {
        self.product_writes.insert(pid.to_string(), None);
    }

    fn enqueue(&mut self, task: Task) {
        self.tasks.push(task);
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        self.validate(&state)?;

        state.clock += 1;
        let version = state.clock;

        for (pid, write) in self.product_writes.drain() {
            match write {
                Some(record) => {
                    state.products.insert(pid, Versioned { version, record });
                }
                None => {
                    state.products.remove(&pid);
                }
            }
        }
        for (id, record) in self.review_writes.drain() {
            state.reviews.insert(id, Versioned { version, record });
        }

        let task_count = self.tasks.len();
        for task in self.tasks.drain(..) {
            state.outbox.push(OutboxEntry::new(task));
        }

        self.product_reads.clear();
        self.review_reads.clear();
        debug!(version = version, tasks = task_count, "Committed transaction");
        Ok(())
    }
}
