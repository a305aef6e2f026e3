//! # Product Search Shared
//!
//! Plain data types shared by every crate of the product search catalog:
//! the transactional records ([`Product`], [`Review`]), the index projection
//! ([`ProductDocument`]), the structured search query, and the outbox
//! [`Task`] envelope used for transaction-scoped follow-up work.

pub mod document;
pub mod product;
pub mod query;
pub mod review;
pub mod task;

pub use document::{field_names, is_valid_doc_id, Field, FieldValue, ProductDocument};
pub use product::Product;
pub use query::{
    QueryClause, SearchHit, SearchQuery, SearchResponse, SortDefault, SortDirection,
    SortExpression, SortSpec,
};
pub use review::{Review, ReviewId, ANONYMOUS_USER};
pub use task::{OutboxEntry, Task};

/// Lowest rating a review may carry.
pub const RATING_MIN: i64 = 1;

/// Highest rating a review may carry.
pub const RATING_MAX: i64 = 5;
