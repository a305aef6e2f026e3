//! OpenSearch query builders and document conversion.
//!
//! This module turns a structured [`SearchQuery`] into an OpenSearch request
//! body, and converts product documents to and from `_source` objects.

use serde_json::{json, Map, Value};

use crate::errors::SearchIndexError;
use crate::opensearch::index_config::{DOC_ID_KEY, TYPED_FIELDS_KEY};
use product_search_shared::{
    field_names, Field, FieldValue, ProductDocument, QueryClause, SearchQuery, SortDefault,
    SortDirection, SortSpec,
};

/// Page size used when the query asks for every result.
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// Build an OpenSearch search body from a SearchQuery.
///
/// The body combines:
/// - a `multi_match` over every field requiring all terms, or `match_all` for empty text
/// - `filter` clauses for atom equality and numeric bands
/// - sort dimensions with per-field missing values, or score ordering
/// - `from`/`size` pagination with exact total hit tracking
pub fn build_search_body(query: &SearchQuery) -> Value {
    let text = query.text.trim();
    let must = if text.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({
            "multi_match": {
                "query": text,
                "type": "cross_fields",
                "fields": ["name^2", "*"],
                "operator": "and",
                "lenient": true
            }
        })
    };

    let filters: Vec<Value> = query.clauses.iter().map(build_clause).collect();

    json!({
        "query": {
            "bool": {
                "must": must,
                "filter": filters
            }
        },
        "sort": build_sort(&query.sort),
        "from": query.offset,
        "size": query.limit.unwrap_or(MAX_RESULT_WINDOW),
        "track_total_hits": true
    })
}

/// Build a body scanning document ids in ascending order.
pub fn build_id_scan_body(start_after: Option<&str>, limit: usize) -> Value {
    let mut body = json!({
        "query": { "match_all": {} },
        "sort": [{ DOC_ID_KEY: { "order": "asc" } }],
        "_source": [DOC_ID_KEY],
        "size": limit
    });
    if let Some(start) = start_after {
        body["search_after"] = json!([start]);
    }
    body
}

fn build_clause(clause: &QueryClause) -> Value {
    match clause {
        QueryClause::AtomEquals { field, value } => json!({ "term": { (field.clone()): value } }),
        QueryClause::NumberRange { field, gte, lt } => {
            json!({ "range": { (field.clone()): { "gte": gte, "lt": lt } } })
        }
        QueryClause::NumberEquals { field, value } => json!({ "term": { (field.clone()): value } }),
    }
}

/// Name of the sortable variant of a field.
fn sort_field(field: &str) -> String {
    if field == field_names::NAME {
        format!("{}.raw", field)
    } else {
        field.to_string()
    }
}

fn build_sort(sort: &SortSpec) -> Value {
    let mut dimensions = match sort {
        SortSpec::Relevance => vec![json!({ "_score": { "order": "desc" } })],
        SortSpec::Expressions(expressions) => expressions
            .iter()
            .map(|expr| {
                let order = match expr.direction {
                    SortDirection::Ascending => "asc",
                    SortDirection::Descending => "desc",
                };
                let missing = match &expr.default_value {
                    SortDefault::Number(n) => json!(n),
                    SortDefault::Text(s) => json!(s),
                };
                json!({ (sort_field(&expr.field)): { "order": order, "missing": missing } })
            })
            .collect(),
    };
    dimensions.push(json!({ DOC_ID_KEY: { "order": "asc" } }));
    Value::Array(dimensions)
}

fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) | FieldValue::Atom(s) => json!(s),
        FieldValue::Number(n) => json!(n),
        FieldValue::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
        FieldValue::GeoPoint {
            latitude,
            longitude,
        } => json!({ "lat": latitude, "lon": longitude }),
    }
}

/// Convert a document into its `_source` object.
///
/// Every field is flattened to a top-level key for searching; the first
/// field of each name wins. The full typed list is kept alongside.
pub fn document_to_source(document: &ProductDocument) -> Result<Value, SearchIndexError> {
    let mut source = Map::new();
    for field in &document.fields {
        source
            .entry(field.name.clone())
            .or_insert_with(|| field_to_json(&field.value));
    }
    source.insert(DOC_ID_KEY.to_string(), json!(document.doc_id));
    let typed = serde_json::to_value(&document.fields)
        .map_err(|e| SearchIndexError::parse(e.to_string()))?;
    source.insert(TYPED_FIELDS_KEY.to_string(), typed);
    Ok(Value::Object(source))
}

/// Rebuild a document from its id and `_source` object.
pub fn document_from_source(doc_id: &str, source: &Value) -> Result<ProductDocument, SearchIndexError> {
    let typed = source
        .get(TYPED_FIELDS_KEY)
        .cloned()
        .ok_or_else(|| SearchIndexError::parse(format!("document {} has no typed fields", doc_id)))?;
    let fields: Vec<Field> =
        serde_json::from_value(typed).map_err(|e| SearchIndexError::parse(e.to_string()))?;
    Ok(ProductDocument::new(doc_id, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use product_search_shared::SortExpression;

    fn sample_document() -> ProductDocument {
        ProductDocument::new(
            "p1",
            vec![
                Field::text(field_names::PID, "p1"),
                Field::text(field_names::NAME, "Dune"),
                Field::atom(field_names::CATEGORY, "books"),
                Field::number(field_names::PRICE, 9.5),
                Field::date(
                    field_names::UPDATED,
                    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                ),
            ],
        )
    }

    #[test]
    fn test_empty_text_matches_all() {
        let body = build_search_body(&SearchQuery::new("  "));

        assert!(body["query"]["bool"]["must"]["match_all"].is_object());
        assert_eq!(body["size"], MAX_RESULT_WINDOW);
        assert_eq!(body["sort"][0]["_score"]["order"], "desc");
    }

    #[test]
    fn test_text_and_filters() {
        let query = SearchQuery::new("dune")
            .with_clause(QueryClause::AtomEquals {
                field: "category".to_string(),
                value: "books".to_string(),
            })
            .with_clause(QueryClause::NumberRange {
                field: "ar".to_string(),
                gte: 2.0,
                lt: 3.0,
            })
            .with_page(3, 6);

        let body = build_search_body(&query);

        assert_eq!(body["query"]["bool"]["must"]["multi_match"]["query"], "dune");
        assert_eq!(body["query"]["bool"]["filter"][0]["term"]["category"], "books");
        assert_eq!(body["query"]["bool"]["filter"][1]["range"]["ar"]["gte"], 2.0);
        assert_eq!(body["query"]["bool"]["filter"][1]["range"]["ar"]["lt"], 3.0);
        assert_eq!(body["from"], 6);
        assert_eq!(body["size"], 3);
    }

    #[test]
    fn test_sort_expressions() {
        let query = SearchQuery::new("").with_sort(SortSpec::Expressions(vec![
            SortExpression::new("name", SortDirection::Ascending, SortDefault::Text("zzz".into())),
            SortExpression::new("ar", SortDirection::Descending, SortDefault::Number(0.0)),
        ]));

        let body = build_search_body(&query);

        assert_eq!(body["sort"][0]["name.raw"]["order"], "asc");
        assert_eq!(body["sort"][0]["name.raw"]["missing"], "zzz");
        assert_eq!(body["sort"][1]["ar"]["order"], "desc");
        assert_eq!(body["sort"][2][DOC_ID_KEY]["order"], "asc");
    }

    #[test]
    fn test_id_scan_cursor() {
        let body = build_id_scan_body(Some("p9"), 50);
        assert_eq!(body["search_after"][0], "p9");
        assert_eq!(body["size"], 50);
        assert!(build_id_scan_body(None, 50).get("search_after").is_none());
    }

    #[test]
    fn test_source_conversion_is_lossless() {
        let document = sample_document();

        let source = document_to_source(&document).unwrap();
        assert_eq!(source["name"], "Dune");
        assert_eq!(source["modified"], "2024-03-01");
        assert_eq!(source[DOC_ID_KEY], "p1");

        let restored = document_from_source("p1", &source).unwrap();
        assert_eq!(restored, document);
    }

    #[test]
    fn test_source_without_typed_fields() {
        let result = document_from_source("p1", &json!({ "name": "x" }));
        assert!(matches!(result, Err(SearchIndexError::ParseError(_))));
    }
}
