//! Index document types.
//!
//! A [`ProductDocument`] is the denormalized, query-optimized projection of a
//! product: the core fields every product carries plus the category-specific
//! attributes. Documents are addressed by `doc_id`, which is normally the
//! product id.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Names of the core fields carried by every product document.
pub mod field_names {
    pub const PID: &str = "pid";
    pub const DESCRIPTION: &str = "description";
    pub const CATEGORY: &str = "category";
    pub const NAME: &str = "name";
    pub const PRICE: &str = "price";
    /// Average rating.
    pub const AVG_RATING: &str = "ar";
    pub const UPDATED: &str = "modified";
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Tokenized full-text value.
    Text(String),
    Number(f64),
    /// Untokenized value, matched exactly.
    Atom(String),
    Date(NaiveDate),
    GeoPoint { latitude: f64, longitude: f64 },
}

impl FieldValue {
    /// String content of a text or atom value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A named, typed document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Number(value),
        }
    }

    pub fn atom(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Atom(value.into()),
        }
    }

    pub fn date(name: impl Into<String>, value: NaiveDate) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Date(value),
        }
    }
}

/// A product document as stored in the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    /// Document id. An empty id asks the index to assign one.
    pub doc_id: String,
    pub fields: Vec<Field>,
}

impl ProductDocument {
    /// Create a document from an id and an ordered field list.
    pub fn new(doc_id: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            doc_id: doc_id.into(),
            fields,
        }
    }

    /// Value of the first field with the given name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_str)
    }

    pub fn number_value(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(FieldValue::as_number)
    }

    /// Replace the first field named like `field`. Returns false when the
    /// document has no such field.
    pub fn set_first_field(&mut self, field: Field) -> bool {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => {
                *existing = field;
                true
            }
            None => false,
        }
    }

    pub fn pid(&self) -> Option<&str> {
        self.text_value(field_names::PID)
    }

    pub fn name(&self) -> Option<&str> {
        self.text_value(field_names::NAME)
    }

    pub fn description(&self) -> Option<&str> {
        self.text_value(field_names::DESCRIPTION)
    }

    pub fn category(&self) -> Option<&str> {
        self.text_value(field_names::CATEGORY)
    }

    pub fn price(&self) -> Option<f64> {
        self.number_value(field_names::PRICE)
    }

    pub fn avg_rating(&self) -> Option<f64> {
        self.number_value(field_names::AVG_RATING)
    }

    /// Overwrite the average rating field.
    pub fn set_avg_rating(&mut self, avg_rating: f64) -> bool {
        self.set_first_field(Field::number(field_names::AVG_RATING, avg_rating))
    }
}

/// Check whether `doc_id` can be used as an index document id: visible
/// printable ASCII only (no whitespace), not starting with `!`.
pub fn is_valid_doc_id(doc_id: &str) -> bool {
    doc_id.chars().all(|c| c.is_ascii_graphic()) && !doc_id.starts_with('!')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> ProductDocument {
        ProductDocument::new(
            "p1",
            vec![
                Field::text(field_names::PID, "p1"),
                Field::text(field_names::NAME, "A Study in Scarlet"),
                Field::atom(field_names::CATEGORY, "books"),
                Field::number(field_names::AVG_RATING, 0.0),
                Field::number(field_names::PRICE, 9.99),
            ],
        )
    }

    #[test]
    fn test_accessors() {
        let doc = sample_document();

        assert_eq!(doc.pid(), Some("p1"));
        assert_eq!(doc.name(), Some("A Study in Scarlet"));
        assert_eq!(doc.category(), Some("books"));
        assert_eq!(doc.price(), Some(9.99));
        assert_eq!(doc.avg_rating(), Some(0.0));
        assert!(doc.description().is_none());
    }

    #[test]
    fn test_set_avg_rating_keeps_other_fields() {
        let mut doc = sample_document();

        assert!(doc.set_avg_rating(3.5));
        assert_eq!(doc.avg_rating(), Some(3.5));
        assert_eq!(doc.fields.len(), 5);
        assert_eq!(doc.price(), Some(9.99));
    }

    #[test]
    fn test_set_first_field_missing() {
        let mut doc = ProductDocument::new("p1", vec![]);
        assert!(!doc.set_avg_rating(2.0));
        assert!(doc.avg_rating().is_none());
    }

    #[test]
    fn test_valid_doc_ids() {
        assert!(is_valid_doc_id("testproduct"));
        assert!(is_valid_doc_id("sku-123_ab!"));
        assert!(!is_valid_doc_id("has space"));
        assert!(!is_valid_doc_id("tab\tid"));
        assert!(!is_valid_doc_id("!bang"));
        assert!(!is_valid_doc_id("caf\u{e9}"));
    }

    #[test]
    fn test_field_value_serde_tagging() {
        let field = Field::number(field_names::PRICE, 2.5);
        let json = serde_json::to_value(&field).unwrap();

        assert_eq!(json["value"]["type"], "number");
        assert_eq!(json["value"]["value"], 2.5);
    }
}
