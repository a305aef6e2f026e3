//! The Review record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-allocated review identifier.
pub type ReviewId = u64;

/// Username recorded for reviews submitted without a logged-in user.
pub const ANONYMOUS_USER: &str = "anonymous";

/// A user review of a product.
///
/// Reviews reference their product by id only. They are kept out of the
/// product's transaction group so that many concurrent reviews do not
/// contend on the product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: String,
    pub username: String,
    pub rating: i64,
    pub comment: String,
    pub active: bool,
    /// True once this review's rating has been folded into the product average.
    pub rating_added: bool,
    pub date_added: DateTime<Utc>,
}

impl Review {
    /// Create a new, not yet applied review.
    pub fn new(
        id: ReviewId,
        product_id: impl Into<String>,
        username: Option<&str>,
        rating: i64,
        comment: impl Into<String>,
    ) -> Self {
        let username = match username {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => ANONYMOUS_USER.to_string(),
        };

        Self {
            id,
            product_id: product_id.into(),
            username,
            rating,
            comment: comment.into(),
            active: true,
            rating_added: false,
            date_added: Utc::now(),
        }
    }
}
