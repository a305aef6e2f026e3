//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::DocumentIdPage;
use product_search_shared::{ProductDocument, SearchQuery, SearchResponse};

/// Abstracts the underlying search index implementation.
///
/// Implementations are injected into `SearchIndexClient` to enable dependency
/// injection and easy testing with mock implementations. The index is a shared
/// resource without locking: concurrent writes to the same document id are
/// last-write-wins.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Index documents, replacing any existing document with the same id.
    ///
    /// # Arguments
    ///
    /// * `documents` - Documents to index. An empty `doc_id` lets the backend assign one.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - The document ids, in the same order as `documents`
    /// * `Err(SearchIndexError)` - If any document failed to index
    async fn put_documents(
        &self,
        documents: &[ProductDocument],
    ) -> Result<Vec<String>, SearchIndexError>;

    /// Fetch a single document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(document))` - If the document exists
    /// * `Ok(None)` - If it does not
    /// * `Err(SearchIndexError)` - If the lookup fails
    async fn get_document(&self, doc_id: &str) -> Result<Option<ProductDocument>, SearchIndexError>;

    /// Delete documents by id.
    ///
    /// Ids that do not exist are ignored, so repeating a delete is a no-op.
    async fn delete_documents(&self, doc_ids: &[String]) -> Result<(), SearchIndexError>;

    /// Scan document ids in ascending order without fetching bodies.
    ///
    /// # Arguments
    ///
    /// * `start_after` - Exclusive lower bound, usually the previous page's cursor
    /// * `limit` - Maximum number of ids to return
    async fn list_document_ids(
        &self,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<DocumentIdPage, SearchIndexError>;

    /// Execute a structured search.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResponse)` - The requested page of hits and the total match count
    /// * `Err(SearchIndexError)` - If the search fails
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchIndexError>;

    /// Ensure the index exists with proper mappings.
    ///
    /// This should be called during application startup.
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    /// Check if the search engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        Ok(true)
    }
}
