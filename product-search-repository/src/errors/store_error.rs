//! Record store error types.

use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A record read by the transaction was changed by a concurrent commit.
    /// Nothing was written; the caller may retry the whole transaction.
    #[error("Transaction conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Create a conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
