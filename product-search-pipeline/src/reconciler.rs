//! Rating reconciler.
//!
//! Folds submitted reviews into their product's running average and pushes
//! the new average into the product document, either right away through an
//! outbox follow-up task or later through the batch sweep.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::errors::{CatalogError, ValidationError};
use product_search_repository::{RecordStore, SearchIndexClient};
use product_search_shared::{
    field_names, Field, Review, ReviewId, Task, RATING_MAX, RATING_MIN,
};

/// How a changed average reaches the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    /// Each applied review schedules a reindex of its product.
    #[default]
    Immediate,
    /// Applied reviews only flag the product; the sweep reindexes in bulk.
    Batched,
}

impl ReconcileMode {
    pub fn from_batch_flag(batched: bool) -> Self {
        if batched {
            Self::Batched
        } else {
            Self::Immediate
        }
    }
}

/// Result of applying a review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyOutcome {
    Applied { avg_rating: f64, num_reviews: u32 },
    /// The review had already been folded in; nothing changed.
    AlreadyApplied,
}

/// Result of a rating reindex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReindexOutcome {
    Reindexed { avg_rating: f64 },
    /// The product was not flagged; its average was written again anyway.
    Refreshed { avg_rating: f64 },
}

/// Parse a submitted rating and check its range.
pub fn parse_rating(raw: &str) -> Result<i64, ValidationError> {
    let rating = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidRating(raw.to_string()))?;
    validate_rating(rating)
}

pub fn validate_rating(rating: i64) -> Result<i64, ValidationError> {
    if (RATING_MIN..=RATING_MAX).contains(&rating) {
        Ok(rating)
    } else {
        Err(ValidationError::RatingOutOfRange(rating))
    }
}

/// Keeps product averages and their documents in step with reviews.
pub struct RatingReconciler {
    store: Arc<dyn RecordStore>,
    index: Arc<SearchIndexClient>,
    mode: ReconcileMode,
}

impl RatingReconciler {
    pub fn new(store: Arc<dyn RecordStore>, index: Arc<SearchIndexClient>, mode: ReconcileMode) -> Self {
        Self { store, index, mode }
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    /// Store a new review and schedule it to be applied.
    #[instrument(skip(self, username, comment))]
    pub async fn submit_review(
        &self,
        product_id: &str,
        username: Option<&str>,
        rating: i64,
        comment: &str,
    ) -> Result<Review, CatalogError> {
        validate_rating(rating)?;
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }

        if self.store.get_product(product_id).await?.is_none() {
            return Err(CatalogError::not_found(format!("product {}", product_id)));
        }

        let review_id = self.store.allocate_id().await?;
        let review = Review::new(review_id, product_id, username, rating, comment);

        let mut txn = self.store.begin().await?;
        txn.put_review(review.clone());
        txn.enqueue(Task::ApplyReview { review_id });
        txn.commit().await?;

        info!(review_id = review_id, pid = %product_id, rating = rating, "Review submitted");
        Ok(review)
    }

    /// Fold a review into its product's average, at most once.
    #[instrument(skip(self))]
    pub async fn apply_review(&self, review_id: ReviewId) -> Result<ApplyOutcome, CatalogError> {
        let mut txn = self.store.begin().await?;

        let mut review = txn
            .get_review(review_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("review {}", review_id)))?;

        if review.rating_added {
            debug!(review_id = review_id, "Review already applied");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let mut product = txn
            .get_product(&review.product_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("product {}", review.product_id)))?;

        review.rating_added = true;
        let avg_rating = product.add_rating(review.rating);
        let num_reviews = product.num_reviews;
        let product_id = product.pid.clone();

        txn.put_review(review);
        txn.put_product(product);
        if self.mode == ReconcileMode::Immediate {
            txn.enqueue(Task::ReindexRating {
                product_id: product_id.clone(),
            });
        }
        txn.commit().await?;

        info!(
            review_id = review_id,
            pid = %product_id,
            avg_rating = avg_rating,
            num_reviews = num_reviews,
            "Review applied"
        );
        Ok(ApplyOutcome::Applied {
            avg_rating,
            num_reviews,
        })
    }

    /// Push a product's current average into its document.
    ///
    /// The dirty flag is cleared first; if the document cannot be written the
    /// flag is set again so a retry or the next sweep picks the product up.
    /// A product that is already clean still has its average written, since
    /// a redelivered task may follow a flag clear whose write never landed.
    #[instrument(skip(self))]
    pub async fn reindex_product_rating(&self, product_id: &str) -> Result<ReindexOutcome, CatalogError> {
        let mut txn = self.store.begin().await?;
        let mut product = txn
            .get_product(product_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("product {}", product_id)))?;

        let avg_rating = product.avg_rating;
        let doc_id = product.doc_id.clone();
        let was_dirty = product.needs_review_reindex;
        if was_dirty {
            product.needs_review_reindex = false;
            txn.put_product(product);
            txn.commit().await?;
        } else {
            debug!(pid = %product_id, "Product already clean, refreshing document rating");
        }

        if let Err(e) = self.write_rating(&doc_id, avg_rating).await {
            warn!(pid = %product_id, error = %e, "Rating reindex failed, restoring dirty flag");
            if let Err(restore_err) = restore_dirty(self.store.as_ref(), product_id).await {
                error!(pid = %product_id, error = %restore_err, "Failed to restore dirty flag");
            }
            return Err(e);
        }

        // A review applied after the load may have been written by someone
        // else before this write landed.
        if let Some(current) = self.store.get_product(product_id).await? {
            if current.avg_rating != avg_rating {
                debug!(pid = %product_id, "Average moved during reindex, flagging again");
                restore_dirty(self.store.as_ref(), product_id).await?;
            }
        }

        debug!(pid = %product_id, avg_rating = avg_rating, "Document rating updated");
        if was_dirty {
            Ok(ReindexOutcome::Reindexed { avg_rating })
        } else {
            Ok(ReindexOutcome::Refreshed { avg_rating })
        }
    }

    async fn write_rating(&self, doc_id: &str, avg_rating: f64) -> Result<(), CatalogError> {
        let mut document = self
            .index
            .get(doc_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("document {}", doc_id)))?;

        if !document.set_avg_rating(avg_rating) {
            document
                .fields
                .push(Field::number(field_names::AVG_RATING, avg_rating));
        }
        self.index.put(&document).await?;
        Ok(())
    }
}

/// Flag a product for reindexing again. Missing products are ignored.
pub(crate) async fn restore_dirty(store: &dyn RecordStore, product_id: &str) -> Result<(), CatalogError> {
    let mut txn = store.begin().await?;
    if let Some(mut product) = txn.get_product(product_id).await? {
        if !product.needs_review_reindex {
            product.needs_review_reindex = true;
            txn.put_product(product);
            txn.commit().await?;
        }
    }
    Ok(())
}
