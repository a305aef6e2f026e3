//! Bulk product import in fixed-size batches.

use tracing::{info, instrument};

use crate::builder::RawParams;
use crate::catalog::{BatchReport, CatalogService};
use crate::errors::CatalogError;

pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 5;
pub const MIN_IMPORT_BATCH_SIZE: usize = 1;
pub const MAX_IMPORT_BATCH_SIZE: usize = 100;

/// Keep an import batch size within the supported range.
pub fn clamp_batch_size(requested: i64) -> usize {
    requested.clamp(MIN_IMPORT_BATCH_SIZE as i64, MAX_IMPORT_BATCH_SIZE as i64) as usize
}

/// Feed rows to `create_batch` chunk by chunk.
///
/// Batches already written stay written if a later batch fails.
#[instrument(skip(catalog, rows), fields(rows = rows.len()))]
pub async fn import_rows(
    catalog: &CatalogService,
    rows: &[RawParams],
    batch_size: i64,
) -> Result<BatchReport, CatalogError> {
    let size = clamp_batch_size(batch_size);
    let mut total = BatchReport::default();

    for (batch, chunk) in rows.chunks(size).enumerate() {
        let offset = batch * size;
        let report = catalog.create_batch(chunk).await?;
        total.created.extend(report.created);
        total
            .skipped
            .extend(report.skipped.into_iter().map(|mut skipped| {
                skipped.row += offset;
                skipped
            }));
    }

    info!(
        created = total.created.len(),
        skipped = total.skipped.len(),
        batch_size = size,
        "Import finished"
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use product_search_repository::{
        InMemoryRecordStore, InMemorySearchIndex, SearchIndexClient,
    };

    fn book(pid: &str) -> RawParams {
        [
            ("pid", pid),
            ("name", "Emma"),
            ("category", "books"),
            ("price", "4.50"),
            ("publisher", "Murray"),
            ("pages", "474"),
            ("author", "Jane Austen"),
            ("title", "Emma"),
            ("isbn", "9780141439587"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_clamp_batch_size() {
        assert_eq!(clamp_batch_size(0), 1);
        assert_eq!(clamp_batch_size(-4), 1);
        assert_eq!(clamp_batch_size(5), 5);
        assert_eq!(clamp_batch_size(500), 100);
    }

    #[tokio::test]
    async fn test_import_in_batches() {
        let store = InMemoryRecordStore::new();
        let catalog = CatalogService::new(
            Arc::new(store.clone()),
            Arc::new(SearchIndexClient::new(Box::new(InMemorySearchIndex::new()))),
        );
        let mut rows: Vec<RawParams> = (0..7).map(|i| book(&format!("b{}", i))).collect();
        rows[5].remove("isbn");

        let report = import_rows(&catalog, &rows, 3).await.unwrap();

        assert_eq!(report.created.len(), 6);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 5);
        assert_eq!(store.product_count().await, 6);
    }
}
