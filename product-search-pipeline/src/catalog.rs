//! Catalog service.
//!
//! Creates, updates and deletes products across both stores. The document is
//! always written before the record, so a failed index write leaves the
//! record store untouched and the operation can simply be re-run.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::builder::{DocumentBuilder, NormalizedProduct, RawParams};
use crate::errors::{CatalogError, ValidationError};
use product_search_repository::{RecordStore, SearchIndexClient};
use product_search_shared::{Product, ProductDocument, Review, Task};

/// A row of a batch that was not imported.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// Position of the row in the submitted batch.
    pub row: usize,
    pub pid: Option<String>,
    pub error: ValidationError,
}

/// Outcome of `create_batch`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Product ids created or updated, in input order.
    pub created: Vec<String>,
    pub skipped: Vec<SkippedRow>,
}

/// Orchestrates product writes over the record store and the search index.
pub struct CatalogService {
    store: Arc<dyn RecordStore>,
    index: Arc<SearchIndexClient>,
    builder: DocumentBuilder,
}

impl CatalogService {
    pub fn new(store: Arc<dyn RecordStore>, index: Arc<SearchIndexClient>) -> Self {
        Self {
            store,
            index,
            builder: DocumentBuilder::new(),
        }
    }

    pub fn with_builder(
        store: Arc<dyn RecordStore>,
        index: Arc<SearchIndexClient>,
        builder: DocumentBuilder,
    ) -> Self {
        Self {
            store,
            index,
            builder,
        }
    }

    pub fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    /// Create a product or rebuild an existing one from raw parameters.
    ///
    /// The existing document's average rating is carried into the rebuilt
    /// document, and an existing record keeps its rating state. A record whose
    /// average differs from the written document is flagged for the sweep.
    #[instrument(skip(self, params), fields(pid = params.get("pid").map(String::as_str).unwrap_or("")))]
    pub async fn create_or_update(&self, params: &RawParams) -> Result<Product, CatalogError> {
        let normalized = NormalizedProduct::from_raw(params)?;
        let existing = self.index.get(&normalized.core.pid).await?;

        let mut document = self.builder.build_document(&normalized)?;
        if let Some(avg_rating) = existing.as_ref().and_then(ProductDocument::avg_rating) {
            document.set_avg_rating(avg_rating);
        }

        let doc_id = self.index.put(&document).await?;

        let core = &normalized.core;
        let mut txn = self.store.begin().await?;
        let product = match txn.get_product(&core.pid).await? {
            Some(mut product) => {
                product.update_core(core.price, core.category.as_str(), doc_id.as_str());
                if document.avg_rating() != Some(product.avg_rating) {
                    warn!(pid = %product.pid, "Document rating differs from record, flagging product");
                    product.needs_review_reindex = true;
                }
                product
            }
            None => Product::new(core.pid.as_str(), core.price, core.category.as_str(), doc_id.as_str()),
        };
        txn.put_product(product.clone());
        txn.commit().await?;

        info!(pid = %product.pid, doc_id = %product.doc_id, "Product saved");
        Ok(product)
    }

    /// Create or update many products with one index call and one transaction.
    ///
    /// Rows failing validation are skipped and reported. Documents of products
    /// that already exist carry the record's current average rating.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn create_batch(&self, rows: &[RawParams]) -> Result<BatchReport, CatalogError> {
        let mut report = BatchReport::default();
        let mut products = Vec::with_capacity(rows.len());
        let mut documents = Vec::with_capacity(rows.len());

        for (row, params) in rows.iter().enumerate() {
            let built = NormalizedProduct::from_raw(params).and_then(|normalized| {
                let document = self.builder.build_document(&normalized)?;
                Ok((normalized, document))
            });

            match built {
                Ok((normalized, document)) => {
                    products.push(normalized);
                    documents.push(document);
                }
                Err(e) => {
                    let pid = params.get("pid").map(|p| p.trim().to_string());
                    warn!(row = row, pid = ?pid, error = %e, "Skipping invalid product row");
                    report.skipped.push(SkippedRow { row, pid, error: e });
                }
            }
        }

        if documents.is_empty() {
            return Ok(report);
        }

        for (normalized, document) in products.iter().zip(documents.iter_mut()) {
            if let Some(existing) = self.store.get_product(&normalized.core.pid).await? {
                document.set_avg_rating(existing.avg_rating);
            }
        }

        let doc_ids = self.index.put_batch(&documents).await?;
        if doc_ids.len() != documents.len() {
            error!(
                expected = documents.len(),
                returned = doc_ids.len(),
                "Index returned a different number of ids than documents sent"
            );
            return Err(CatalogError::operation_failed(format!(
                "index returned {} ids for {} documents",
                doc_ids.len(),
                documents.len()
            )));
        }

        let mut txn = self.store.begin().await?;
        for ((normalized, document), doc_id) in products.iter().zip(&documents).zip(&doc_ids) {
            let core = &normalized.core;
            let product = match txn.get_product(&core.pid).await? {
                Some(mut product) => {
                    product.update_core(core.price, core.category.as_str(), doc_id.as_str());
                    if document.avg_rating() != Some(product.avg_rating) {
                        product.needs_review_reindex = true;
                    }
                    product
                }
                None => Product::new(core.pid.as_str(), core.price, core.category.as_str(), doc_id.as_str()),
            };
            report.created.push(product.pid.clone());
            txn.put_product(product);
        }
        txn.commit().await?;

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            "Product batch saved"
        );
        Ok(report)
    }

    /// Delete a product. Its reviews and document are removed by outbox
    /// tasks that exist only if the record delete commits.
    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: &str) -> Result<(), CatalogError> {
        let mut txn = self.store.begin().await?;
        let product = txn
            .get_product(product_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("product {}", product_id)))?;

        txn.delete_product(product_id);
        txn.enqueue(Task::DeleteReviews {
            product_id: product_id.to_string(),
        });
        txn.enqueue(Task::DeleteDocument {
            product_id: product_id.to_string(),
            doc_id: product.doc_id.clone(),
        });
        txn.commit().await?;

        info!(pid = %product_id, "Product deleted");
        Ok(())
    }

    pub async fn get_product(&self, product_id: &str) -> Result<Option<Product>, CatalogError> {
        Ok(self.store.get_product(product_id).await?)
    }

    pub async fn get_document(&self, doc_id: &str) -> Result<Option<ProductDocument>, CatalogError> {
        Ok(self.index.get(doc_id).await?)
    }

    /// Active reviews of a product whose rating has been applied, oldest first.
    pub async fn reviews_for_product(&self, product_id: &str) -> Result<Vec<Review>, CatalogError> {
        let reviews = self.store.reviews_for_product(product_id).await?;
        Ok(reviews
            .into_iter()
            .filter(|r| r.active && r.rating_added)
            .collect())
    }

    /// Remove every review of a product. Idempotent.
    pub async fn delete_reviews(&self, product_id: &str) -> Result<usize, CatalogError> {
        let removed = self.store.delete_reviews_for_product(product_id).await?;
        debug!(pid = %product_id, removed = removed, "Deleted reviews");
        Ok(removed)
    }

    /// Remove a document from the index. Idempotent.
    pub async fn remove_document(&self, doc_id: &str) -> Result<(), CatalogError> {
        self.index.delete(&[doc_id.to_string()]).await?;
        debug!(doc_id = %doc_id, "Removed document");
        Ok(())
    }

    /// Remove every document from the index. Records are left alone.
    pub async fn clear_index(&self) -> Result<usize, CatalogError> {
        Ok(self.index.clear().await?)
    }
}
