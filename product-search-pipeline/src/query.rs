//! Query engine.
//!
//! Builds structured catalog searches from request parameters, runs them,
//! and derives the rating drill-down links and pagination for a result page.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::{CatalogError, ValidationError};
use crate::registry::CategoryRegistry;
use product_search_repository::SearchIndexClient;
use product_search_shared::{
    field_names, ProductDocument, QueryClause, SearchQuery, SortDefault, SortDirection,
    SortExpression, SortSpec, RATING_MAX, RATING_MIN,
};

/// Highest offset a "next page" link may point past.
pub const OFFSET_LIMIT: usize = 1000;

/// Page size used when the request does not name one.
pub const DEFAULT_DOC_LIMIT: usize = 3;

/// Sort key meaning "order by ranking score".
pub const RELEVANCE: &str = "relevance";

/// Search parameters as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    pub category: Option<String>,
    /// Rating band to drill into. Values outside the rating range are ignored.
    pub rating: Option<i64>,
    pub sort: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

/// One rating drill-down link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingLink {
    pub rating: i64,
    pub count: usize,
    pub label: String,
}

/// A rendered page of search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub documents: Vec<ProductDocument>,
    pub number_found: usize,
    pub returned: usize,
    pub query_string: String,
    pub prev_offset: Option<usize>,
    pub next_offset: Option<usize>,
    pub rating_links: Vec<RatingLink>,
    pub sort_menu: Vec<(String, String)>,
    pub category_menu: Vec<(String, String)>,
}

/// The sort expression for a recognized key.
pub fn sort_expression(key: &str) -> Option<SortExpression> {
    let (direction, default) = match key {
        field_names::AVG_RATING => (SortDirection::Descending, SortDefault::Number(0.0)),
        field_names::PRICE => (SortDirection::Ascending, SortDefault::Number(9999.0)),
        field_names::UPDATED => (SortDirection::Descending, SortDefault::Number(1.0)),
        field_names::CATEGORY => (SortDirection::Ascending, SortDefault::Text(String::new())),
        field_names::NAME => (SortDirection::Ascending, SortDefault::Text("zzz".to_string())),
        _ => return None,
    };
    Some(SortExpression::new(key, direction, default))
}

/// Resolve a sort key to the sort to apply.
///
/// Rating sorts break ties by price; every other key breaks ties by rating.
pub fn resolve_sort(key: Option<&str>) -> Result<SortSpec, ValidationError> {
    let key = match key.map(str::trim) {
        None | Some("") | Some(RELEVANCE) => return Ok(SortSpec::Relevance),
        Some(key) => key,
    };

    let primary =
        sort_expression(key).ok_or_else(|| ValidationError::UnknownSortKey(key.to_string()))?;
    let secondary_key = if key == field_names::AVG_RATING {
        field_names::PRICE
    } else {
        field_names::AVG_RATING
    };
    let secondary = sort_expression(secondary_key)
        .ok_or_else(|| ValidationError::UnknownSortKey(secondary_key.to_string()))?;

    Ok(SortSpec::Expressions(vec![primary, secondary]))
}

/// Clause restricting results to one rating band, or `None` when out of range.
pub fn rating_clause(rating: i64) -> Option<QueryClause> {
    let field = field_names::AVG_RATING.to_string();
    if rating == RATING_MAX {
        Some(QueryClause::NumberEquals {
            field,
            value: rating as f64,
        })
    } else if (RATING_MIN..RATING_MAX).contains(&rating) {
        Some(QueryClause::NumberRange {
            field,
            gte: rating as f64,
            lt: (rating + 1) as f64,
        })
    } else {
        None
    }
}

/// `(value, label)` pairs for the sort selector, built once.
pub fn sort_menu() -> &'static [(String, String)] {
    static MENU: OnceLock<Vec<(String, String)>> = OnceLock::new();
    MENU.get_or_init(|| {
        [
            (RELEVANCE, "relevance"),
            (field_names::AVG_RATING, "average rating"),
            (field_names::PRICE, "price"),
            (field_names::UPDATED, "modified"),
            (field_names::CATEGORY, "category"),
            (field_names::NAME, "product name"),
        ]
        .into_iter()
        .map(|(value, label)| (value.to_string(), label.to_string()))
        .collect()
    })
}

/// Labelled links for every rating level, `k-k+1 (count)` below the top
/// rating and `k (count)` for it.
pub fn rating_links(buckets: &BTreeMap<i64, usize>) -> Vec<RatingLink> {
    (RATING_MIN..=RATING_MAX)
        .map(|rating| {
            let count = buckets.get(&rating).copied().unwrap_or(0);
            let label = if rating < RATING_MAX {
                format!("{}-{} ({})", rating, rating + 1, count)
            } else {
                format!("{} ({})", rating, count)
            };
            RatingLink {
                rating,
                count,
                label,
            }
        })
        .collect()
}

/// Offsets of the previous and next pages, if they exist.
pub fn pagination(
    offset: usize,
    limit: usize,
    returned: usize,
    number_found: usize,
) -> (Option<usize>, Option<usize>) {
    if limit == 0 {
        return (None, None);
    }
    let prev = offset.checked_sub(limit);
    let next = offset
        .checked_add(limit)
        .filter(|next| *next <= OFFSET_LIMIT)
        .filter(|_| returned == limit)
        .filter(|_| {
            offset
                .checked_add(returned)
                .is_some_and(|seen| seen < number_found)
        });
    (prev, next)
}

/// Builds and runs catalog searches.
pub struct QueryEngine {
    index: Arc<SearchIndexClient>,
    doc_limit: usize,
}

impl QueryEngine {
    pub fn new(index: Arc<SearchIndexClient>) -> Self {
        Self::with_doc_limit(index, DEFAULT_DOC_LIMIT)
    }

    pub fn with_doc_limit(index: Arc<SearchIndexClient>, doc_limit: usize) -> Self {
        Self {
            index,
            doc_limit: doc_limit.max(1),
        }
    }

    pub fn doc_limit(&self) -> usize {
        self.doc_limit
    }

    /// Text and category filter only: the query facets are computed over.
    pub fn base_query(&self, request: &SearchRequest) -> SearchQuery {
        let mut query = SearchQuery::new(request.text.trim());
        if let Some(category) = request.category.as_deref().map(str::trim) {
            if !category.is_empty() {
                query = query.with_clause(QueryClause::AtomEquals {
                    field: field_names::CATEGORY.to_string(),
                    value: category.to_string(),
                });
            }
        }
        query
    }

    /// The full paged, sorted and rating-filtered query for a request.
    ///
    /// Page sizes are clamped to `1..=OFFSET_LIMIT`; offsets past
    /// `OFFSET_LIMIT` are rejected.
    pub fn build_query(&self, request: &SearchRequest) -> Result<SearchQuery, ValidationError> {
        if request.offset > OFFSET_LIMIT {
            return Err(ValidationError::OffsetOutOfRange(request.offset));
        }
        let limit = request.limit.unwrap_or(self.doc_limit).clamp(1, OFFSET_LIMIT);

        let mut query = self.base_query(request);
        if let Some(clause) = request.rating.and_then(rating_clause) {
            query = query.with_clause(clause);
        }
        let sort = resolve_sort(request.sort.as_deref())?;
        Ok(query
            .with_sort(sort)
            .with_page(limit, request.offset))
    }

    /// Tally the base query's full result set by whole-number rating.
    ///
    /// Every rating level is present in the result, with zero for levels
    /// no document falls into.
    #[instrument(skip(self, base_query), fields(query = %base_query.query_string()))]
    pub async fn facet_rating_buckets(
        &self,
        base_query: &SearchQuery,
    ) -> Result<BTreeMap<i64, usize>, CatalogError> {
        let mut scan = base_query.clone();
        scan.sort = SortSpec::Relevance;
        scan.limit = None;
        scan.offset = 0;

        let response = self.index.search(&scan).await?;

        let mut buckets: BTreeMap<i64, usize> =
            (RATING_MIN..=RATING_MAX).map(|rating| (rating, 0)).collect();
        for hit in &response.hits {
            let rating = hit.document.avg_rating().unwrap_or(0.0).floor() as i64;
            *buckets.entry(rating).or_insert(0) += 1;
        }
        debug!(scanned = response.hits.len(), "Tallied rating buckets");
        Ok(buckets)
    }

    /// Run a search and assemble the result page.
    #[instrument(skip(self, request), fields(text = %request.text, offset = request.offset))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchPage, CatalogError> {
        let query = self.build_query(request)?;
        let limit = query.limit.unwrap_or(self.doc_limit);

        let response = self.index.search(&query).await?;
        let buckets = self.facet_rating_buckets(&self.base_query(request)).await?;

        let returned = response.hits.len();
        let (prev_offset, next_offset) =
            pagination(query.offset, limit, returned, response.number_found);

        debug!(
            returned = returned,
            number_found = response.number_found,
            "Search page built"
        );

        Ok(SearchPage {
            documents: response.hits.into_iter().map(|hit| hit.document).collect(),
            number_found: response.number_found,
            returned,
            query_string: query.query_string(),
            prev_offset,
            next_offset,
            rating_links: rating_links(&buckets),
            sort_menu: sort_menu().to_vec(),
            category_menu: CategoryRegistry::builtin().category_menu(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use product_search_repository::{InMemorySearchIndex, SearchIndexProvider};
    use product_search_shared::Field;

    fn doc(pid: &str, category: &str, price: f64, ar: f64) -> ProductDocument {
        ProductDocument::new(
            pid,
            vec![
                Field::text(field_names::PID, pid),
                Field::text(field_names::NAME, format!("Gadget {}", pid)),
                Field::atom(field_names::CATEGORY, category),
                Field::number(field_names::AVG_RATING, ar),
                Field::number(field_names::PRICE, price),
            ],
        )
    }

    async fn engine() -> QueryEngine {
        let index = InMemorySearchIndex::new();
        index
            .put_documents(&[
                doc("a", "books", 10.0, 3.5),
                doc("b", "books", 5.0, 3.0),
                doc("c", "books", 7.0, 5.0),
                doc("d", "hd televisions", 900.0, 0.0),
                doc("e", "books", 2.0, 1.2),
            ])
            .await
            .unwrap();
        QueryEngine::new(Arc::new(SearchIndexClient::new(Box::new(index))))
    }

    #[test]
    fn test_rating_clause_bands() {
        assert_eq!(
            rating_clause(3),
            Some(QueryClause::NumberRange {
                field: "ar".to_string(),
                gte: 3.0,
                lt: 4.0
            })
        );
        assert_eq!(
            rating_clause(5),
            Some(QueryClause::NumberEquals {
                field: "ar".to_string(),
                value: 5.0
            })
        );
        assert_eq!(rating_clause(0), None);
        assert_eq!(rating_clause(6), None);
    }

    #[test]
    fn test_resolve_sort() {
        assert_eq!(resolve_sort(None), Ok(SortSpec::Relevance));
        assert_eq!(resolve_sort(Some("relevance")), Ok(SortSpec::Relevance));

        let SortSpec::Expressions(by_rating) = resolve_sort(Some("ar")).unwrap() else {
            panic!("expected expressions");
        };
        assert_eq!(by_rating[0].field, "ar");
        assert_eq!(by_rating[0].direction, SortDirection::Descending);
        assert_eq!(by_rating[1].field, "price");
        assert_eq!(by_rating[1].default_value, SortDefault::Number(9999.0));

        let SortSpec::Expressions(by_name) = resolve_sort(Some("name")).unwrap() else {
            panic!("expected expressions");
        };
        assert_eq!(by_name[0].default_value, SortDefault::Text("zzz".to_string()));
        assert_eq!(by_name[1].field, "ar");

        assert_eq!(
            resolve_sort(Some("colour")),
            Err(ValidationError::UnknownSortKey("colour".to_string()))
        );
    }

    #[test]
    fn test_sort_menu_is_stable() {
        let menu = sort_menu();
        assert_eq!(menu.len(), 6);
        assert_eq!(menu[0], ("relevance".to_string(), "relevance".to_string()));
        assert_eq!(menu[5].1, "product name");
        assert!(std::ptr::eq(menu, sort_menu()));
    }

    #[test]
    fn test_rating_link_labels() {
        let buckets: BTreeMap<i64, usize> = [(3, 2), (5, 1)].into_iter().collect();
        let labels: Vec<String> = rating_links(&buckets).into_iter().map(|l| l.label).collect();

        assert_eq!(
            labels,
            vec!["1-2 (0)", "2-3 (0)", "3-4 (2)", "4-5 (0)", "5 (1)"]
        );
    }

    #[test]
    fn test_pagination() {
        assert_eq!(pagination(0, 3, 3, 10), (None, Some(3)));
        assert_eq!(pagination(3, 3, 3, 6), (Some(0), None));
        assert_eq!(pagination(6, 3, 2, 8), (Some(3), None));
        assert_eq!(pagination(999, 3, 3, 5000), (Some(996), None));
        assert_eq!(pagination(0, 0, 0, 5), (None, None));
        assert_eq!(pagination(usize::MAX, 3, 3, 5000), (Some(usize::MAX - 3), None));
    }

    #[tokio::test]
    async fn test_build_query_bounds_paging() {
        let engine = engine().await;

        let empty_page = SearchRequest {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(engine.build_query(&empty_page).unwrap().limit, Some(1));

        let huge_page = SearchRequest {
            limit: Some(usize::MAX),
            ..Default::default()
        };
        assert_eq!(
            engine.build_query(&huge_page).unwrap().limit,
            Some(OFFSET_LIMIT)
        );
    }

    #[tokio::test]
    async fn test_search_rejects_offset_past_limit() {
        let engine = engine().await;
        let request = SearchRequest {
            offset: usize::MAX,
            ..Default::default()
        };

        let result = engine.search(&request).await;

        assert!(matches!(
            result,
            Err(CatalogError::Validation(ValidationError::OffsetOutOfRange(_)))
        ));
    }

    #[tokio::test]
    async fn test_zero_limit_has_no_self_link() {
        let engine = engine().await;
        let request = SearchRequest {
            category: Some("books".to_string()),
            limit: Some(0),
            ..Default::default()
        };

        let page = engine.search(&request).await.unwrap();

        assert_eq!(page.returned, 1);
        assert_eq!(page.next_offset, Some(1));
    }

    #[tokio::test]
    async fn test_build_query_ignores_out_of_range_rating() {
        let engine = engine().await;
        let request = SearchRequest {
            text: "gadget".to_string(),
            category: Some("books".to_string()),
            rating: Some(9),
            ..Default::default()
        };

        let query = engine.build_query(&request).unwrap();

        assert_eq!(query.query_string(), "gadget category:\"books\"");
        assert_eq!(query.limit, Some(DEFAULT_DOC_LIMIT));
    }

    #[tokio::test]
    async fn test_facets_ignore_rating_filter() {
        let engine = engine().await;
        let request = SearchRequest {
            category: Some("books".to_string()),
            rating: Some(3),
            ..Default::default()
        };

        let buckets = engine
            .facet_rating_buckets(&engine.base_query(&request))
            .await
            .unwrap();

        assert_eq!(buckets[&3], 2);
        assert_eq!(buckets[&5], 1);
        assert_eq!(buckets[&1], 1);
        assert_eq!(buckets[&2], 0);
    }

    #[tokio::test]
    async fn test_search_page() {
        let engine = engine().await;
        let request = SearchRequest {
            category: Some("books".to_string()),
            sort: Some("price".to_string()),
            limit: Some(2),
            ..Default::default()
        };

        let page = engine.search(&request).await.unwrap();

        let pids: Vec<&str> = page.documents.iter().filter_map(|d| d.pid()).collect();
        assert_eq!(pids, vec!["e", "b"]);
        assert_eq!(page.number_found, 4);
        assert_eq!(page.prev_offset, None);
        assert_eq!(page.next_offset, Some(2));
        assert_eq!(page.rating_links[2].label, "3-4 (2)");
        assert_eq!(page.category_menu.len(), 2);
    }

    #[tokio::test]
    async fn test_search_rating_drill_down() {
        let engine = engine().await;
        let request = SearchRequest {
            rating: Some(5),
            ..Default::default()
        };

        let page = engine.search(&request).await.unwrap();

        assert_eq!(page.number_found, 1);
        assert_eq!(page.documents[0].pid(), Some("c"));
    }

    #[tokio::test]
    async fn test_search_unknown_sort_key() {
        let engine = engine().await;
        let request = SearchRequest {
            sort: Some("weight".to_string()),
            ..Default::default()
        };

        let result = engine.search(&request).await;

        assert!(matches!(
            result,
            Err(CatalogError::Validation(ValidationError::UnknownSortKey(_)))
        ));
    }
}
