//! Outbox tasks.
//!
//! Work that must happen only if a transaction commits is written to the
//! record store's outbox inside that transaction, then executed afterwards by
//! an at-least-once runner. Every task is idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::review::ReviewId;

/// Follow-up work scheduled by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Fold a newly submitted review into its product's average.
    ApplyReview { review_id: ReviewId },
    /// Push a product's current average rating into its document.
    ReindexRating { product_id: String },
    /// Remove every review referencing a deleted product.
    DeleteReviews { product_id: String },
    /// Remove a deleted product's document from the index.
    DeleteDocument { product_id: String, doc_id: String },
}

impl Task {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Task::ApplyReview { .. } => "apply_review",
            Task::ReindexRating { .. } => "reindex_rating",
            Task::DeleteReviews { .. } => "delete_reviews",
            Task::DeleteDocument { .. } => "delete_document",
        }
    }
}

/// A committed task waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub task: Task,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl OutboxEntry {
    pub fn new(task: Task) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind() {
        assert_eq!(Task::ApplyReview { review_id: 1 }.kind(), "apply_review");
        assert_eq!(
            Task::DeleteDocument {
                product_id: "p1".to_string(),
                doc_id: "p1".to_string()
            }
            .kind(),
            "delete_document"
        );
    }

    #[test]
    fn test_new_entry() {
        let entry = OutboxEntry::new(Task::ReindexRating {
            product_id: "p1".to_string(),
        });
        assert_eq!(entry.attempts, 0);
    }
}
