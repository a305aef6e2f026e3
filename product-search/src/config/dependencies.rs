//! Dependency initialization and wiring for the catalog worker.

use std::sync::Arc;
use tracing::info;

use crate::config::CatalogConfig;
use crate::worker::Worker;
use crate::AppError;
use product_search_pipeline::import::import_rows;
use product_search_pipeline::{
    BatchReport, BatchSweep, CatalogService, QueryEngine, RatingReconciler, RawParams, TaskRunner,
};
use product_search_repository::opensearch::IndexConfig;
use product_search_repository::{
    InMemoryRecordStore, InMemorySearchIndex, OpenSearchClient, RecordStore, SearchIndexClient,
    SearchIndexConfig, SearchIndexProvider,
};

/// Version suffix of the physical index behind the alias.
const INDEX_VERSION: u32 = 1;

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub store: Arc<dyn RecordStore>,
    pub index: Arc<SearchIndexClient>,
    pub catalog: Arc<CatalogService>,
    pub reconciler: Arc<RatingReconciler>,
    pub queries: QueryEngine,
    /// Rows per `create_batch` call made by `import`.
    pub import_batch_size: usize,
    /// The configured worker ready to run.
    pub worker: Worker,
}

impl Dependencies {
    /// Initialize all dependencies from the given settings.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(AppError)` - If the index cannot be reached or created
    pub async fn new(config: &CatalogConfig) -> Result<Self, AppError> {
        info!(
            opensearch_url = ?config.opensearch_url,
            index_name = %config.index_name,
            reconcile_mode = ?config.reconcile_mode,
            doc_limit = config.doc_limit,
            "Initializing dependencies"
        );

        let provider: Box<dyn SearchIndexProvider> = match &config.opensearch_url {
            Some(url) => {
                let client = OpenSearchClient::new(
                    url,
                    IndexConfig::new(config.index_name.clone(), INDEX_VERSION),
                )
                .await
                .map_err(|e| {
                    AppError::config(format!("Failed to create OpenSearch client: {}", e))
                })?;
                Box::new(client)
            }
            None => {
                info!("OPENSEARCH_URL not set, using in-memory search index");
                Box::new(InMemorySearchIndex::new())
            }
        };

        let index = Arc::new(SearchIndexClient::with_config(
            provider,
            SearchIndexConfig::with_max_batch_size(config.max_index_batch_size),
        ));

        // Verify the index is reachable
        let healthy = index
            .health_check()
            .await
            .map_err(|e| AppError::config(format!("Search index health check failed: {}", e)))?;

        if !healthy {
            return Err(AppError::config("Search index is unhealthy"));
        }

        index.ensure_index().await?;

        info!("Search index connection verified");

        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());

        let catalog = Arc::new(CatalogService::new(store.clone(), index.clone()));
        let reconciler = Arc::new(RatingReconciler::new(
            store.clone(),
            index.clone(),
            config.reconcile_mode,
        ));
        let queries = QueryEngine::with_doc_limit(index.clone(), config.doc_limit);

        let runner = TaskRunner::new(store.clone(), catalog.clone(), reconciler.clone());
        // Also runs in immediate mode, for products whose reindex task was dropped.
        let sweep = BatchSweep::new(store.clone(), index.clone());

        let worker = Worker::new(
            runner,
            sweep,
            config.outbox_poll_interval,
            config.sweep_interval,
        );

        Ok(Self {
            store,
            index,
            catalog,
            reconciler,
            queries,
            import_batch_size: config.import_batch_size,
            worker,
        })
    }

    /// Import product rows in batches of the configured size.
    pub async fn import(&self, rows: &[RawParams]) -> Result<BatchReport, AppError> {
        let batch_size = i64::try_from(self.import_batch_size).unwrap_or(i64::MAX);
        Ok(import_rows(&self.catalog, rows, batch_size).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use product_search_pipeline::RawParams;

    fn params(pairs: &[(&str, &str)]) -> RawParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_in_memory_wiring() {
        let deps = Dependencies::new(&CatalogConfig::default()).await.unwrap();

        deps.catalog
            .create_or_update(&params(&[
                ("pid", "tv1"),
                ("name", "Flat Screen"),
                ("description", "Big and flat"),
                ("category", "hd televisions"),
                ("price", "499"),
                ("brand", "Acme"),
                ("tv_type", "LED"),
                ("size", "55"),
            ]))
            .await
            .unwrap();

        assert!(deps.index.get("tv1").await.unwrap().is_some());
        assert!(deps.store.get_product("tv1").await.unwrap().is_some());
        assert_eq!(deps.queries.doc_limit(), 3);
    }

    #[tokio::test]
    async fn test_import_uses_configured_batch_size() {
        let config = CatalogConfig {
            import_batch_size: 1,
            max_index_batch_size: 1,
            ..CatalogConfig::default()
        };
        let deps = Dependencies::new(&config).await.unwrap();
        let rows: Vec<RawParams> = ["tv1", "tv2", "tv3"]
            .into_iter()
            .map(|pid| {
                params(&[
                    ("pid", pid),
                    ("name", "Flat Screen"),
                    ("description", "Big and flat"),
                    ("category", "hd televisions"),
                    ("price", "499"),
                    ("brand", "Acme"),
                    ("tv_type", "LED"),
                    ("size", "55"),
                ])
            })
            .collect();

        let report = deps.import(&rows).await.unwrap();

        assert_eq!(report.created.len(), 3);
        assert!(deps.store.get_product("tv3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bad_opensearch_url_is_config_error() {
        let config = CatalogConfig {
            opensearch_url: Some("not a url".to_string()),
            ..CatalogConfig::default()
        };

        assert!(matches!(
            Dependencies::new(&config).await,
            Err(AppError::ConfigError(_))
        ));
    }
}
