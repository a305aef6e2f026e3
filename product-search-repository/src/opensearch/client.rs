//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    params::Refresh,
    BulkParts, GetParts, OpenSearch, SearchParts,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{get_index_settings, IndexConfig, DOC_ID_KEY};
use crate::opensearch::queries::{
    build_id_scan_body, build_search_body, document_from_source, document_to_source,
};
use crate::types::DocumentIdPage;
use product_search_shared::{
    is_valid_doc_id, ProductDocument, SearchHit, SearchQuery, SearchResponse,
};

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    hits: HitsBody,
}

#[derive(Debug, Deserialize)]
struct HitsBody {
    total: TotalHits,
    #[serde(default)]
    hits: Vec<HitBody>,
}

#[derive(Debug, Deserialize)]
struct TotalHits {
    value: usize,
}

#[derive(Debug, Deserialize)]
struct HitBody {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
}

/// OpenSearch client implementation.
///
/// Provides full-text search over product documents using OpenSearch as the
/// backend. Writes go through the bulk API and wait for a refresh so that a
/// search issued right after a write observes it.
///
/// # Example
///
/// ```ignore
/// use product_search_repository::opensearch::IndexConfig;
/// let client = OpenSearchClient::new("http://localhost:9200", IndexConfig::default()).await?;
/// client.ensure_index_exists().await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index configuration containing alias and version
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            alias = %index_config.alias,
            version = index_config.version,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Send a bulk body and fail if any item failed.
    ///
    /// Items whose status is listed in `tolerated` are not failures.
    async fn send_bulk(
        &self,
        body: Vec<JsonBody<Value>>,
        tolerated: &[u64],
    ) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .bulk(BulkParts::Index(&self.index_config.alias))
            .refresh(Refresh::WaitFor)
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::bulk_operation(format!(
                "Bulk request failed with status {}: {}",
                status, error_body
            )));
        }

        let parsed: BulkResponse = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        if parsed.errors {
            let failed: Vec<String> = parsed
                .items
                .iter()
                .filter_map(|item| item.as_object()?.values().next().cloned())
                .filter(|result| {
                    let item_status = result["status"].as_u64().unwrap_or(0);
                    result.get("error").is_some() && !tolerated.contains(&item_status)
                })
                .map(|result| result["_id"].as_str().unwrap_or_default().to_string())
                .collect();

            if !failed.is_empty() {
                error!(failed = failed.len(), "Bulk items failed");
                return Err(SearchIndexError::bulk_operation(format!(
                    "{} bulk items failed: {}",
                    failed.len(),
                    failed.join(", ")
                )));
            }
        }

        Ok(())
    }

    async fn run_search(&self, body: Value) -> Result<SearchResponseBody, SearchIndexError> {
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index_config.alias]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Search request failed");
            return Err(SearchIndexError::query(format!(
                "Search failed with status {}: {}",
                status, error_body
            )));
        }

        response
            .json::<SearchResponseBody>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    /// Index documents through a single bulk request.
    ///
    /// Documents without an id get a fresh UUID before the request is sent, so
    /// the returned ids are known without parsing the bulk items.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn put_documents(
        &self,
        documents: &[ProductDocument],
    ) -> Result<Vec<String>, SearchIndexError> {
        let mut ids = Vec::with_capacity(documents.len());
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);

        for document in documents {
            let doc_id = if document.doc_id.is_empty() {
                Uuid::new_v4().to_string()
            } else if is_valid_doc_id(&document.doc_id) {
                document.doc_id.clone()
            } else {
                return Err(SearchIndexError::validation(format!(
                    "illegal document id: {:?}",
                    document.doc_id
                )));
            };

            let mut source = document_to_source(document)?;
            source[DOC_ID_KEY] = json!(doc_id);

            body.push(json!({ "index": { "_id": doc_id } }).into());
            body.push(source.into());
            ids.push(doc_id);
        }

        if ids.is_empty() {
            return Ok(ids);
        }

        self.send_bulk(body, &[]).await?;
        debug!(count = ids.len(), "Documents indexed");
        Ok(ids)
    }

    async fn get_document(&self, doc_id: &str) -> Result<Option<ProductDocument>, SearchIndexError> {
        let response = self
            .client
            .get(GetParts::IndexId(&self.index_config.alias, doc_id))
            .send()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Get request failed");
            return Err(SearchIndexError::query(format!(
                "Get failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        if !body["found"].as_bool().unwrap_or(false) {
            return Ok(None);
        }
        document_from_source(doc_id, &body["_source"]).map(Some)
    }

    /// Delete documents through a single bulk request.
    ///
    /// Missing documents come back as 404 items, which are not failures.
    #[instrument(skip(self, doc_ids), fields(count = doc_ids.len()))]
    async fn delete_documents(&self, doc_ids: &[String]) -> Result<(), SearchIndexError> {
        if doc_ids.is_empty() {
            return Ok(());
        }

        let body: Vec<JsonBody<Value>> = doc_ids
            .iter()
            .map(|id| json!({ "delete": { "_id": id } }).into())
            .collect();

        self.send_bulk(body, &[404])
            .await
            .map_err(|e| SearchIndexError::delete(e.to_string()))?;
        debug!(count = doc_ids.len(), "Documents deleted");
        Ok(())
    }

    async fn list_document_ids(
        &self,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<DocumentIdPage, SearchIndexError> {
        let parsed = self.run_search(build_id_scan_body(start_after, limit)).await?;
        let ids = parsed.hits.hits.into_iter().map(|hit| hit.id).collect();
        Ok(DocumentIdPage::from_ids(ids, limit))
    }

    #[instrument(skip(self, query), fields(query = %query.query_string(), offset = query.offset))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchIndexError> {
        let parsed = self.run_search(build_search_body(query)).await?;

        let mut hits = Vec::with_capacity(parsed.hits.hits.len());
        for hit in parsed.hits.hits {
            match document_from_source(&hit.id, &hit.source) {
                Ok(document) => hits.push(SearchHit {
                    document,
                    score: hit.score.unwrap_or(0.0),
                }),
                Err(e) => warn!(doc_id = %hit.id, error = %e, "Skipping unreadable hit"),
            }
        }

        debug!(
            returned = hits.len(),
            number_found = parsed.hits.total.value,
            "Search completed"
        );

        Ok(SearchResponse {
            hits,
            number_found: parsed.hits.total.value,
        })
    }

    /// Create the versioned index with its alias if it is not there yet.
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        let index_name = self.index_config.versioned_name();

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&index_name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(index = %index_name, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&index_name))
            .body(get_index_settings(&self.index_config))
            .send()
            .await
            .map_err(|e| SearchIndexError::index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::index(format!(
                "Index creation failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index_name, alias = %self.index_config.alias, "Created index");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let status = health["status"].as_str().unwrap_or("unknown");

        debug!(status = %status, "OpenSearch cluster status");
        Ok(status == "green" || status == "yellow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let body = json!({
            "hits": {
                "total": { "value": 7, "relation": "eq" },
                "hits": [
                    {
                        "_id": "p1",
                        "_score": 1.5,
                        "_source": { "doc_fields": [] }
                    },
                    {
                        "_id": "p2",
                        "_score": null,
                        "_source": { "doc_fields": [] }
                    }
                ]
            }
        });

        let parsed: SearchResponseBody = serde_json::from_value(body).unwrap();

        assert_eq!(parsed.hits.total.value, 7);
        assert_eq!(parsed.hits.hits[0].id, "p1");
        assert_eq!(parsed.hits.hits[0].score, Some(1.5));
        assert!(parsed.hits.hits[1].score.is_none());
    }

    #[test]
    fn test_parse_bulk_response() {
        let body = json!({
            "took": 3,
            "errors": true,
            "items": [
                { "delete": { "_id": "p1", "status": 404, "error": { "type": "not_found" } } }
            ]
        });

        let parsed: BulkResponse = serde_json::from_value(body).unwrap();

        assert!(parsed.errors);
        assert_eq!(parsed.items.len(), 1);
    }

    #[tokio::test]
    async fn test_new_rejects_bad_url() {
        let result = OpenSearchClient::new("not a url", IndexConfig::default()).await;
        assert!(matches!(result, Err(SearchIndexError::ConnectionError(_))));
    }
}
