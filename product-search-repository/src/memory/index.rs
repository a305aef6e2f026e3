//! In-memory search index.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::DocumentIdPage;
use product_search_shared::{
    is_valid_doc_id, FieldValue, ProductDocument, QueryClause, SearchHit, SearchQuery,
    SearchResponse, SortDefault, SortDirection, SortExpression, SortSpec,
};

/// Search index kept in a sorted map keyed by document id.
///
/// Text matching is case-insensitive substring matching of every query term
/// against the document's text and atom fields. The score is the number of
/// term occurrences found.
#[derive(Debug, Clone, Default)]
pub struct InMemorySearchIndex {
    documents: Arc<RwLock<BTreeMap<String, ProductDocument>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes and deletes fail, to simulate an unreachable index.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn check_writable(&self) -> Result<(), SearchIndexError> {
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(SearchIndexError::connection("index unavailable"));
        }
        Ok(())
    }
}

fn searchable_text(document: &ProductDocument) -> String {
    document
        .fields
        .iter()
        .filter_map(|f| f.value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Score a document against the query terms, `None` if any term is missing.
fn score(document: &ProductDocument, terms: &[String]) -> Option<f64> {
    if terms.is_empty() {
        return Some(0.0);
    }
    let haystack = searchable_text(document);
    let mut total = 0usize;
    for term in terms {
        let hits = haystack.matches(term.as_str()).count();
        if hits == 0 {
            return None;
        }
        total += hits;
    }
    Some(total as f64)
}

fn clause_matches(document: &ProductDocument, clause: &QueryClause) -> bool {
    match clause {
        QueryClause::AtomEquals { field, value } => {
            document.text_value(field).map_or(false, |v| v == value)
        }
        QueryClause::NumberRange { field, gte, lt } => document
            .number_value(field)
            .map_or(false, |v| v >= *gte && v < *lt),
        QueryClause::NumberEquals { field, value } => {
            document.number_value(field).map_or(false, |v| v == *value)
        }
    }
}

fn compare_by(a: &ProductDocument, b: &ProductDocument, expr: &SortExpression) -> Ordering {
    let ordering = match &expr.default_value {
        SortDefault::Number(default) => {
            let left = a.number_value(&expr.field).unwrap_or(*default);
            let right = b.number_value(&expr.field).unwrap_or(*default);
            left.partial_cmp(&right).unwrap_or(Ordering::Equal)
        }
        SortDefault::Text(default) => {
            let left = sort_text(a, &expr.field).unwrap_or_else(|| default.to_lowercase());
            let right = sort_text(b, &expr.field).unwrap_or_else(|| default.to_lowercase());
            left.cmp(&right)
        }
    };
    match expr.direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn sort_text(document: &ProductDocument, field: &str) -> Option<String> {
    match document.field(field)? {
        FieldValue::Date(date) => Some(date.to_string()),
        value => value.as_str().map(str::to_lowercase),
    }
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchIndex {
    async fn put_documents(
        &self,
        documents: &[ProductDocument],
    ) -> Result<Vec<String>, SearchIndexError> {
        self.check_writable()?;

        for document in documents {
            if !document.doc_id.is_empty() && !is_valid_doc_id(&document.doc_id) {
                return Err(SearchIndexError::validation(format!(
                    "illegal document id: {:?}",
                    document.doc_id
                )));
            }
        }

        let mut stored = self.documents.write().await;
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            let mut document = document.clone();
            if document.doc_id.is_empty() {
                document.doc_id = Uuid::new_v4().to_string();
            }
            ids.push(document.doc_id.clone());
            stored.insert(document.doc_id.clone(), document);
        }
        Ok(ids)
    }

    async fn get_document(&self, doc_id: &str) -> Result<Option<ProductDocument>, SearchIndexError> {
        Ok(self.documents.read().await.get(doc_id).cloned())
    }

    async fn delete_documents(&self, doc_ids: &[String]) -> Result<(), SearchIndexError> {
        self.check_writable()?;

        let mut stored = self.documents.write().await;
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
        let stored = self.documents.read().await;
        let ids: Vec<String> = stored
            .keys()
            .filter(|id| start_after.map_or(true, |start| id.as_str() > start))
            .take(limit)
            .cloned()
            .collect();
        Ok(DocumentIdPage::from_ids(ids, limit))
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchIndexError> {
        let terms: Vec<String> = query
            .text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let stored = self.documents.read().await;
        let mut hits: Vec<SearchHit> = stored
            .values()
            .filter(|doc| query.clauses.iter().all(|c| clause_matches(doc, c)))
            .filter_map(|doc| {
                score(doc, &terms).map(|score| SearchHit {
                    document: doc.clone(),
                    score,
                })
            })
            .collect();

        match &query.sort {
            SortSpec::Relevance => hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.document.doc_id.cmp(&b.document.doc_id))
            }),
            SortSpec::Expressions(expressions) => hits.sort_by(|a, b| {
                expressions
                    .iter()
                    .map(|expr| compare_by(&a.document, &b.document, expr))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.document.doc_id.cmp(&b.document.doc_id))
            }),
        }

        let number_found = hits.len();
        let page: Vec<SearchHit> = match query.limit {
            Some(limit) => hits.into_iter().skip(query.offset).take(limit).collect(),
            None => hits.into_iter().skip(query.offset).collect(),
        };

        Ok(SearchResponse {
            hits: page,
            number_found,
        })
    }
}
