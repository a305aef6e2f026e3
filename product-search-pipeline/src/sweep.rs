//! Batch sweep over products whose documents are stale.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::errors::CatalogError;
use crate::reconciler::restore_dirty;
use product_search_repository::{RecordStore, SearchIndexClient, StoreError};
use product_search_shared::{field_names, Field, ProductDocument};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Ids handed to the sweep.
    pub examined: usize,
    /// Products whose document now carries the current average.
    pub reindexed: Vec<String>,
    /// Products gone or no longer dirty by the time they were reloaded.
    pub skipped: usize,
    /// Products left dirty because their document does not exist.
    pub missing_documents: Vec<String>,
    /// Products left dirty because a concurrent commit won.
    pub conflicts: usize,
}

/// Reindexes flagged products in bulk.
pub struct BatchSweep {
    store: Arc<dyn RecordStore>,
    index: Arc<SearchIndexClient>,
}

impl BatchSweep {
    pub fn new(store: Arc<dyn RecordStore>, index: Arc<SearchIndexClient>) -> Self {
        Self { store, index }
    }

    /// Reconcile every product currently flagged dirty.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport, CatalogError> {
        let ids = self.store.dirty_product_ids().await?;
        if ids.is_empty() {
            debug!("No dirty products");
            return Ok(SweepReport::default());
        }
        self.reconcile_dirty(&ids).await
    }

    /// Reconcile the given products, each in its own transaction, then write
    /// all rebuilt documents in bulk.
    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    pub async fn reconcile_dirty(&self, product_ids: &[String]) -> Result<SweepReport, CatalogError> {
        let mut report = SweepReport {
            examined: product_ids.len(),
            ..Default::default()
        };
        let mut documents: Vec<ProductDocument> = Vec::new();

        for product_id in product_ids {
            let mut txn = match self.store.begin().await {
                Ok(txn) => txn,
                Err(e) => return self.abort(&report.reindexed, e.into()).await,
            };
            let loaded = match txn.get_product(product_id).await {
                Ok(loaded) => loaded,
                Err(e) => return self.abort(&report.reindexed, e.into()).await,
            };
            let mut product = match loaded {
                Some(product) if product.needs_review_reindex => product,
                _ => {
                    debug!(pid = %product_id, "Skipping product that is no longer dirty");
                    report.skipped += 1;
                    continue;
                }
            };

            let mut document = match self.index.get(&product.doc_id).await {
                Ok(Some(document)) => document,
                Err(e) => return self.abort(&report.reindexed, e.into()).await,
                Ok(None) => {
                    error!(pid = %product_id, doc_id = %product.doc_id, "Dirty product has no document");
                    report.missing_documents.push(product_id.clone());
                    continue;
                }
            };
            if !document.set_avg_rating(product.avg_rating) {
                document
                    .fields
                    .push(Field::number(field_names::AVG_RATING, product.avg_rating));
            }

            product.needs_review_reindex = false;
            txn.put_product(product);
            match txn.commit().await {
                Ok(()) => {
                    report.reindexed.push(product_id.clone());
                    documents.push(document);
                }
                Err(StoreError::Conflict(msg)) => {
                    warn!(pid = %product_id, reason = %msg, "Product changed during sweep");
                    report.conflicts += 1;
                }
                Err(e) => return self.abort(&report.reindexed, e.into()).await,
            }
        }

        let chunk_size = self
            .index
            .max_batch_size()
            .unwrap_or(documents.len())
            .max(1);
        for chunk in documents.chunks(chunk_size) {
            if let Err(e) = self.index.put_batch(chunk).await {
                error!(error = %e, "Bulk reindex failed");
                return self.abort(&report.reindexed, e.into()).await;
            }
        }

        info!(
            examined = report.examined,
            reindexed = report.reindexed.len(),
            skipped = report.skipped,
            conflicts = report.conflicts,
            missing = report.missing_documents.len(),
            "Sweep complete"
        );
        Ok(report)
    }

    /// Re-flag products cleared by this sweep and surface the error.
    async fn abort(&self, cleared: &[String], err: CatalogError) -> Result<SweepReport, CatalogError> {
        for product_id in cleared {
            if let Err(e) = restore_dirty(self.store.as_ref(), product_id).await {
                error!(pid = %product_id, error = %e, "Failed to restore dirty flag");
            }
        }
        Err(err)
    }
}
