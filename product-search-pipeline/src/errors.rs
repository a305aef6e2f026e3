//! Error types for the catalog services.

use thiserror::Error;

use product_search_repository::{SearchIndexError, StoreError};

/// Bad or missing caller input. Always reported to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("category '{category}' requires field '{field}'")]
    MissingCategoryField { category: String, field: String },

    #[error("field '{field}' of category '{category}' is not a number: {value:?}")]
    InvalidNumber {
        category: String,
        field: String,
        value: String,
    },

    #[error("price is not a number: {0:?}")]
    InvalidPrice(String),

    #[error("illegal document id: {0:?}")]
    IllegalDocumentId(String),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("unknown sort key '{0}'")]
    UnknownSortKey(String),

    #[error("offset {0} is past the last reachable page")]
    OffsetOutOfRange(usize),

    #[error("rating {0} is out of range")]
    RatingOutOfRange(i64),

    #[error("rating is not an integer: {0:?}")]
    InvalidRating(String),

    #[error("review comment is empty")]
    EmptyComment,

    #[error("unknown field type '{tag}' for field '{field}'")]
    UnknownFieldType { field: String, tag: String },
}

/// Errors surfaced by catalog operations.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Store or index failure, transaction conflict, or a broken batch invariant.
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl CatalogError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an operation failed error.
    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        Self::OperationFailed(err.to_string())
    }
}

impl From<SearchIndexError> for CatalogError {
    fn from(err: SearchIndexError) -> Self {
        Self::OperationFailed(err.to_string())
    }
}
