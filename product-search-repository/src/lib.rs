//! # Product Search Repository
//!
//! This crate provides the traits and implementations the catalog uses to
//! reach its two stores: the transactional record store holding products,
//! reviews and the task outbox, and the search index holding product
//! documents. It includes error definitions, in-memory backends for both
//! stores, and an OpenSearch implementation of the index.

pub mod client;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;

pub use client::SearchIndexClient;
pub use config::SearchIndexConfig;
pub use errors::{SearchIndexError, StoreError};
pub use interfaces::{RecordStore, RecordTransaction, SearchIndexProvider};
pub use memory::{InMemoryRecordStore, InMemorySearchIndex};
pub use opensearch::OpenSearchClient;
pub use types::DocumentIdPage;
