//! Structured search query and response types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::ProductDocument;

/// Direction of a sort dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Value substituted for documents missing the sort field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortDefault {
    Number(f64),
    Text(String),
}

/// One sort dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortExpression {
    pub field: String,
    pub direction: SortDirection,
    pub default_value: SortDefault,
}

impl SortExpression {
    pub fn new(field: impl Into<String>, direction: SortDirection, default_value: SortDefault) -> Self {
        Self {
            field: field.into(),
            direction,
            default_value,
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum SortSpec {
    /// Order by the index's ranking score.
    #[default]
    Relevance,
    /// Order by the given dimensions, first one primary.
    Expressions(Vec<SortExpression>),
}

/// A filter clause appended to the free-text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryClause {
    /// Exact match against an atom field.
    AtomEquals { field: String, value: String },
    /// Half-open numeric band `gte <= value < lt`.
    NumberRange { field: String, gte: f64, lt: f64 },
    NumberEquals { field: String, value: f64 },
}

impl fmt::Display for QueryClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryClause::AtomEquals { field, value } => write!(f, "{}:\"{}\"", field, value),
            QueryClause::NumberRange { field, gte, lt } => {
                write!(f, "{} >= {} {} < {}", field, gte, field, lt)
            }
            QueryClause::NumberEquals { field, value } => write!(f, "{}:{}", field, value),
        }
    }
}

/// A structured catalog search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free text entered by the user. Empty matches every document.
    pub text: String,
    pub clauses: Vec<QueryClause>,
    pub sort: SortSpec,
    /// Page size. `None` returns the full result set.
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SearchQuery {
    /// An unfiltered, unpaged query for the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_clause(mut self, clause: QueryClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Render the text and clauses as a single query string, e.g.
    /// `holmes category:"books" ar >= 3 ar < 4`.
    pub fn query_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.clauses.len() + 1);
        let text = self.text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
        parts.extend(self.clauses.iter().map(ToString::to_string));
        parts.join(" ")
    }
}

/// One document returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: ProductDocument,
    pub score: f64,
}

/// Results of a search: the requested page plus the total match count.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Number of documents matching the query, across all pages.
    pub number_found: usize,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_rendering() {
        let query = SearchQuery::new(" holmes ")
            .with_clause(QueryClause::AtomEquals {
                field: "category".to_string(),
                value: "books".to_string(),
            })
            .with_clause(QueryClause::NumberRange {
                field: "ar".to_string(),
                gte: 3.0,
                lt: 4.0,
            });

        assert_eq!(query.query_string(), "holmes category:\"books\" ar >= 3 ar < 4");
    }

    #[test]
    fn test_query_string_exact_rating() {
        let query = SearchQuery::new("").with_clause(QueryClause::NumberEquals {
            field: "ar".to_string(),
            value: 5.0,
        });

        assert_eq!(query.query_string(), "ar:5");
    }

    #[test]
    fn test_defaults() {
        let query = SearchQuery::new("tv").with_page(3, 6);

        assert_eq!(query.sort, SortSpec::Relevance);
        assert_eq!(query.limit, Some(3));
        assert_eq!(query.offset, 6);
        assert!(SearchResponse::empty().hits.is_empty());
    }
}
