//! The Product record.

use serde::{Deserialize, Serialize};

/// A product as held in the transactional record store.
///
/// The record only carries the "core" values; the full, category-specific
/// attribute set lives in the product's index document. The average rating
/// is authoritative here and is pushed to the document by reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product id. Record key, and normally the index document id as well.
    pub pid: String,
    /// Id the index assigned to the product's document.
    pub doc_id: String,
    pub price: f64,
    pub category: String,
    /// Running mean over every review folded in with `rating_added`.
    pub avg_rating: f64,
    /// Number of reviews folded into `avg_rating`.
    pub num_reviews: u32,
    pub active: bool,
    /// Set when `avg_rating` changed and the document has not caught up yet.
    pub needs_review_reindex: bool,
}

impl Product {
    /// Create a fresh, unrated product record.
    pub fn new(
        pid: impl Into<String>,
        price: f64,
        category: impl Into<String>,
        doc_id: impl Into<String>,
    ) -> Self {
        Self {
            pid: pid.into(),
            doc_id: doc_id.into(),
            price,
            category: category.into(),
            avg_rating: 0.0,
            num_reviews: 0,
            active: true,
            needs_review_reindex: false,
        }
    }

    /// Replace the core values, leaving rating state untouched.
    pub fn update_core(&mut self, price: f64, category: impl Into<String>, doc_id: impl Into<String>) {
        self.price = price;
        self.category = category.into();
        self.doc_id = doc_id.into();
    }

    /// Fold one more rating into the running average and flag the document
    /// as stale. Returns the new average.
    ///
    /// Uses `avg' = avg + (rating - avg) / n` so the history never has to be
    /// re-read.
    pub fn add_rating(&mut self, rating: i64) -> f64 {
        self.num_reviews += 1;
        self.avg_rating += (rating as f64 - self.avg_rating) / f64::from(self.num_reviews);
        self.needs_review_reindex = true;
        self.avg_rating
    }
}
