//! # Product Search Pipeline
//!
//! Catalog services that keep the record store and the search index
//! consistent with each other.
//!
//! ## Architecture
//!
//! 1. **Registry / Builder**: turn product parameters into index documents
//! 2. **Catalog**: write products to the index, then to the record store
//! 3. **Reconciler**: fold reviews into running averages and reindex them
//! 4. **Sweep**: bulk-reindex products flagged dirty
//! 5. **Query**: build searches, rating facets and result pages
//! 6. **Tasks**: run outbox follow-ups after their transaction commits

pub mod builder;
pub mod catalog;
pub mod errors;
pub mod import;
pub mod query;
pub mod reconciler;
pub mod registry;
pub mod sweep;
pub mod tasks;

pub use builder::{DocumentBuilder, NormalizedProduct, RawParams};
pub use catalog::{BatchReport, CatalogService, SkippedRow};
pub use errors::{CatalogError, ValidationError};
pub use query::{QueryEngine, SearchPage, SearchRequest};
pub use reconciler::{ApplyOutcome, RatingReconciler, ReconcileMode, ReindexOutcome};
pub use registry::{CategoryRegistry, FieldType};
pub use sweep::{BatchSweep, SweepReport};
pub use tasks::{TaskRunReport, TaskRunner, TaskRunnerConfig};
