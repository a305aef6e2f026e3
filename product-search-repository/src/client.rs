//! Search index client implementation.
//!
//! This module provides the main client for interacting with the search index.
//! Application code uses this to fetch, write, delete and query product documents.

use tracing::{debug, info};

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use product_search_shared::{ProductDocument, SearchQuery, SearchResponse};

/// The main client for interacting with the search index.
/// Application code uses this to query, create, update, and delete documents.
pub struct SearchIndexClient {
    provider: Box<dyn SearchIndexProvider>,
    config: SearchIndexConfig,
}

impl SearchIndexClient {
    /// Create a new SearchIndexClient with default configuration.
    pub fn new(provider: Box<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexConfig::default(),
        }
    }

    /// Create a new SearchIndexClient with custom configuration.
    pub fn with_config(provider: Box<dyn SearchIndexProvider>, config: SearchIndexConfig) -> Self {
        Self { provider, config }
    }

    /// Largest batch accepted by `put_batch` and `delete`, if limited.
    pub fn max_batch_size(&self) -> Option<usize> {
        self.config.max_batch_size
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Fetch a document by id.
    /// An empty id never matches a document.
    pub async fn get(&self, doc_id: &str) -> Result<Option<ProductDocument>, SearchIndexError> {
        if doc_id.is_empty() {
            return Ok(None);
        }
        self.provider.get_document(doc_id).await
    }

    /// Index a single document, replacing any document with the same id.
    /// Output: the id the index stored the document under.
    pub async fn put(&self, document: &ProductDocument) -> Result<String, SearchIndexError> {
        let ids = self
            .provider
            .put_documents(std::slice::from_ref(document))
            .await?;

        ids.into_iter()
            .next()
            .ok_or_else(|| SearchIndexError::index("could not index document"))
    }

    /// Index many documents in one call.
    /// Output: document ids in input order.
    ///
    /// The batch size is limited by the configured max_batch_size (default: 1000).
    pub async fn put_batch(
        &self,
        documents: &[ProductDocument],
    ) -> Result<Vec<String>, SearchIndexError> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        self.validate_batch_size(documents.len())?;

        let ids = self.provider.put_documents(documents).await?;
        debug!(count = ids.len(), "Indexed document batch");
        Ok(ids)
    }

    /// Delete documents by id. Missing documents are not an error.
    ///
    /// The batch size is limited by the configured max_batch_size (default: 1000).
    pub async fn delete(&self, doc_ids: &[String]) -> Result<(), SearchIndexError> {
        if doc_ids.is_empty() {
            return Ok(());
        }

        self.validate_batch_size(doc_ids.len())?;

        self.provider.delete_documents(doc_ids).await
    }

    /// Query the search index.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchIndexError> {
        self.provider.search(query).await
    }

    /// Remove every document from the index.
    ///
    /// Repeatedly scans a page of ids and deletes it until the scan comes
    /// back empty. Returns the number of documents removed.
    pub async fn clear(&self) -> Result<usize, SearchIndexError> {
        let page_size = match self.config.max_batch_size {
            Some(max) => self.config.scan_page_size.min(max),
            None => self.config.scan_page_size,
        };
        let mut removed = 0;

        loop {
            let page = self.provider.list_document_ids(None, page_size).await?;
            if page.is_empty() {
                break;
            }
            removed += page.ids.len();
            self.provider.delete_documents(&page.ids).await?;
        }

        info!(removed = removed, "Cleared search index");
        Ok(removed)
    }

    /// Ensure the index exists.
    pub async fn ensure_index(&self) -> Result<(), SearchIndexError> {
        self.provider.ensure_index_exists().await
    }

    /// Check if the search engine is healthy.
    pub async fn health_check(&self) -> Result<bool, SearchIndexError> {
        self.provider.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentIdPage;
    use async_trait::async_trait;
    use product_search_shared::Field;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Mock provider for testing
    struct MockProvider {
        documents: Arc<Mutex<BTreeMap<String, ProductDocument>>>,
        put_calls: Arc<Mutex<usize>>,
        should_fail: bool,
        drop_results: bool,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                documents: Arc::new(Mutex::new(BTreeMap::new())),
                put_calls: Arc::new(Mutex::new(0)),
                should_fail: false,
                drop_results: false,
            }
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockProvider {
        async fn put_documents(
            &self,
            documents: &[ProductDocument],
        ) -> Result<Vec<String>, SearchIndexError> {
            if self.should_fail {
                return Err(SearchIndexError::bulk_operation("Mock failure"));
            }
            *self.put_calls.lock().await += 1;
            if self.drop_results {
                return Ok(vec![]);
            }
            let mut stored = self.documents.lock().await;
            let mut ids = Vec::new();
            for doc in documents {
                stored.insert(doc.doc_id.clone(), doc.clone());
                ids.push(doc.doc_id.clone());
            }
            Ok(ids)
        }

        async fn get_document(
            &self,
            doc_id: &str,
        ) -> Result<Option<ProductDocument>, SearchIndexError> {
            Ok(self.documents.lock().await.get(doc_id).cloned())
        }

        async fn delete_documents(&self, doc_ids: &[String]) -> Result<(), SearchIndexError> {
            if self.should_fail {
                return Err(SearchIndexError::delete("Mock failure"));
            }
            let mut stored = self.documents.lock().await;
            for id in doc_ids {
                stored.remove(id);
            }
            Ok(())
        }

        async fn list_document_ids(
            &self,
            start_after: Option<&str>,
            limit: usize,
        ) -> Result<DocumentIdPage, SearchIndexError> {
            let stored = self.documents.lock().await;
            let ids: Vec<String> = stored
                .keys()
                .filter(|id| start_after.map_or(true, |start| id.as_str() > start))
                .take(limit)
                .cloned()
                .collect();
            Ok(DocumentIdPage::from_ids(ids, limit))
        }

        async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SearchIndexError> {
            Ok(SearchResponse::empty())
        }
    }

    fn create_test_document(doc_id: &str) -> ProductDocument {
        ProductDocument::new(doc_id, vec![Field::text("pid", doc_id)])
    }

    #[tokio::test]
    async fn test_put_returns_id() {
        let client = SearchIndexClient::new(Box::new(MockProvider::new()));

        let id = client.put(&create_test_document("p1")).await.unwrap();

        assert_eq!(id, "p1");
        assert!(client.get("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_without_result_fails() {
        let mut provider = MockProvider::new();
        provider.drop_results = true;
        let client = SearchIndexClient::new(Box::new(provider));

        let result = client.put(&create_test_document("p1")).await;

        assert!(matches!(result, Err(SearchIndexError::IndexError(_))));
    }

    #[tokio::test]
    async fn test_get_empty_id() {
        let client = SearchIndexClient::new(Box::new(MockProvider::new()));
        assert!(client.get("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_batch_empty_skips_provider() {
        let provider = MockProvider::new();
        let calls = provider.put_calls.clone();
        let client = SearchIndexClient::new(Box::new(provider));

        let ids = client.put_batch(&[]).await.unwrap();

        assert!(ids.is_empty());
        assert_eq!(*calls.lock().await, 0);
    }

    #[tokio::test]
    async fn test_put_batch_size_limit() {
        let client = SearchIndexClient::with_config(
            Box::new(MockProvider::new()),
            SearchIndexConfig::with_max_batch_size(2),
        );
        let docs: Vec<ProductDocument> = (0..3)
            .map(|i| create_test_document(&format!("p{}", i)))
            .collect();

        let result = client.put_batch(&docs).await;

        assert!(matches!(
            result,
            Err(SearchIndexError::BatchSizeExceeded { provided: 3, max: 2 })
        ));
    }

    #[tokio::test]
    async fn test_put_batch_propagates_failure() {
        let mut provider = MockProvider::new();
        provider.should_fail = true;
        let client = SearchIndexClient::new(Box::new(provider));

        let result = client.put_batch(&[create_test_document("p1")]).await;

        assert!(matches!(result, Err(SearchIndexError::BulkOperationError(_))));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let provider = MockProvider::new();
        let documents = provider.documents.clone();
        let client = SearchIndexClient::with_config(
            Box::new(provider),
            SearchIndexConfig {
                max_batch_size: Some(1000),
                scan_page_size: 2,
            },
        );
        let docs: Vec<ProductDocument> = (0..5)
            .map(|i| create_test_document(&format!("p{}", i)))
            .collect();
        client.put_batch(&docs).await.unwrap();

        let removed = client.clear().await.unwrap();

        assert_eq!(removed, 5);
        assert!(documents.lock().await.is_empty());
    }
}
