//! Settings read from the environment.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::AppError;
use product_search_pipeline::import::{clamp_batch_size, DEFAULT_IMPORT_BATCH_SIZE};
use product_search_pipeline::query::DEFAULT_DOC_LIMIT;
use product_search_pipeline::ReconcileMode;
use product_search_repository::opensearch::DEFAULT_INDEX_ALIAS;
use product_search_shared::is_valid_doc_id;

/// Default maximum number of documents per index call.
const DEFAULT_MAX_INDEX_BATCH_SIZE: usize = 1000;

/// Default outbox poll interval, in milliseconds.
const DEFAULT_OUTBOX_POLL_INTERVAL_MS: u64 = 1000;

/// Default sweep interval, in seconds.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Runtime settings of the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// OpenSearch URL. `None` selects the in-memory index.
    pub opensearch_url: Option<String>,
    pub index_name: String,
    pub reconcile_mode: ReconcileMode,
    /// Results per search page.
    pub doc_limit: usize,
    pub import_batch_size: usize,
    pub max_index_batch_size: usize,
    pub outbox_poll_interval: Duration,
    pub sweep_interval: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            opensearch_url: None,
            index_name: DEFAULT_INDEX_ALIAS.to_string(),
            reconcile_mode: ReconcileMode::Immediate,
            doc_limit: DEFAULT_DOC_LIMIT,
            import_batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            max_index_batch_size: DEFAULT_MAX_INDEX_BATCH_SIZE,
            outbox_poll_interval: Duration::from_millis(DEFAULT_OUTBOX_POLL_INTERVAL_MS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl CatalogConfig {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: unset, in-memory index)
    /// - `PRODUCT_INDEX_NAME`: index alias (default: productsearch1)
    /// - `BATCH_RATINGS_UPDATE`: reindex ratings by sweep instead of per review (default: false)
    /// - `DOC_LIMIT`: results per page (default: 3)
    /// - `IMPORT_BATCH_SIZE`: rows per import batch, clamped to 1..=100 (default: 5)
    /// - `MAX_INDEX_BATCH_SIZE`: documents per index call (default: 1000)
    /// - `OUTBOX_POLL_INTERVAL_MS`: outbox poll interval (default: 1000)
    /// - `SWEEP_INTERVAL_SECS`: dirty-rating sweep interval (default: 300)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let index_name = value("PRODUCT_INDEX_NAME").unwrap_or(defaults.index_name);
        if !is_valid_doc_id(&index_name) {
            return Err(AppError::config(format!(
                "PRODUCT_INDEX_NAME is not a legal index name: {:?}",
                index_name
            )));
        }

        let batched = match value("BATCH_RATINGS_UPDATE") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::config(format!("BATCH_RATINGS_UPDATE is not a boolean: {:?}", raw))
            })?,
            None => false,
        };

        let import_batch_size = match value("IMPORT_BATCH_SIZE") {
            Some(raw) => raw
                .parse::<i64>()
                .map(clamp_batch_size)
                .unwrap_or_else(|_| {
                    warn!(value = %raw, "Ignoring unparsable IMPORT_BATCH_SIZE");
                    defaults.import_batch_size
                }),
            None => defaults.import_batch_size,
        };

        Ok(Self {
            opensearch_url: value("OPENSEARCH_URL"),
            index_name,
            reconcile_mode: ReconcileMode::from_batch_flag(batched),
            doc_limit: parse_or_default(value("DOC_LIMIT"), "DOC_LIMIT", defaults.doc_limit)
                .max(1),
            import_batch_size,
            max_index_batch_size: parse_or_default(
                value("MAX_INDEX_BATCH_SIZE"),
                "MAX_INDEX_BATCH_SIZE",
                defaults.max_index_batch_size,
            )
            .max(1),
            outbox_poll_interval: Duration::from_millis(parse_or_default(
                value("OUTBOX_POLL_INTERVAL_MS"),
                "OUTBOX_POLL_INTERVAL_MS",
                DEFAULT_OUTBOX_POLL_INTERVAL_MS,
            )),
            sweep_interval: Duration::from_secs(parse_or_default(
                value("SWEEP_INTERVAL_SECS"),
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )),
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a numeric setting, logging and falling back to the default.
fn parse_or_default<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match raw {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key = key, value = %raw, "Ignoring unparsable setting");
            default
        }),
        None => default,
    }
}
