//! Interface definitions for the catalog's two stores.
//!
//! This module defines the abstract `SearchIndexProvider` and `RecordStore`
//! traits that allow for dependency injection and swappable backends.

mod record_store;
mod search_index_provider;

pub use record_store::{RecordStore, RecordTransaction};
pub use search_index_provider::SearchIndexProvider;
