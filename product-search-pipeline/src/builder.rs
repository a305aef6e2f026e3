//! Document builder.
//!
//! Turns normalized product parameters into an index document: the core
//! fields every product carries followed by the category's required fields.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};

use crate::errors::ValidationError;
use crate::registry::CategoryRegistry;
use product_search_shared::{field_names, is_valid_doc_id, Field, ProductDocument};

/// Raw product parameters as submitted by a form or import row.
pub type RawParams = HashMap<String, String>;

/// Core values shared by every product.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreFields {
    pub pid: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
}

/// Product parameters after trimming and price parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProduct {
    pub core: CoreFields,
    /// Every submitted parameter, including the core ones.
    pub extra: RawParams,
}

impl NormalizedProduct {
    /// Trim the identifying fields and parse the price.
    pub fn from_raw(params: &RawParams) -> Result<Self, ValidationError> {
        let get = |key: &str| params.get(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let raw_price = params
            .get(field_names::PRICE)
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ValidationError::MissingField(field_names::PRICE.to_string()))?;
        let price = raw_price
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .ok_or_else(|| ValidationError::InvalidPrice(raw_price.to_string()))?;

        Ok(Self {
            core: CoreFields {
                pid: get(field_names::PID),
                name: get(field_names::NAME),
                description: params
                    .get(field_names::DESCRIPTION)
                    .cloned()
                    .unwrap_or_default(),
                category: get(field_names::CATEGORY),
                price,
            },
            extra: params.clone(),
        })
    }
}

/// Remove everything that looks like a markup tag (`<...>`).
///
/// Matches what the regex `<[^>]*?>` would: each `<` up to the nearest `>`.
/// An unclosed `<` and the text after it are kept.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        match rest[start..].find('>') {
            Some(len) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + len + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Builds product documents against a category registry.
#[derive(Debug, Clone, Copy)]
pub struct DocumentBuilder {
    registry: &'static CategoryRegistry,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// A builder over the built-in categories.
    pub fn new() -> Self {
        Self {
            registry: CategoryRegistry::builtin(),
        }
    }

    pub fn with_registry(registry: &'static CategoryRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'static CategoryRegistry {
        self.registry
    }

    /// Build the ordered field list, stamping `modified` with today's date.
    pub fn build_fields(
        &self,
        core: &CoreFields,
        category: &str,
        extra: &RawParams,
    ) -> Result<Vec<Field>, ValidationError> {
        self.build_fields_on(Utc::now().date_naive(), core, category, extra)
    }

    /// Build the ordered field list with an explicit `modified` date.
    pub fn build_fields_on(
        &self,
        modified: NaiveDate,
        core: &CoreFields,
        category: &str,
        extra: &RawParams,
    ) -> Result<Vec<Field>, ValidationError> {
        for (name, value) in [
            (field_names::PID, core.pid.as_str()),
            (field_names::CATEGORY, category),
            (field_names::NAME, core.name.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name.to_string()));
            }
        }

        if !is_valid_doc_id(&core.pid) {
            return Err(ValidationError::IllegalDocumentId(core.pid.clone()));
        }

        let schema = self
            .registry
            .fields_for(category)
            .ok_or_else(|| ValidationError::UnknownCategory(category.to_string()))?;

        let mut fields = vec![
            Field::text(field_names::PID, core.pid.as_str()),
            Field::date(field_names::UPDATED, modified),
            Field::text(field_names::NAME, core.name.as_str()),
            Field::text(field_names::DESCRIPTION, strip_markup(&core.description)),
            Field::atom(field_names::CATEGORY, category),
            Field::number(field_names::AVG_RATING, 0.0),
            Field::number(field_names::PRICE, core.price),
        ];

        for (name, field_type) in schema {
            let raw = extra
                .get(name)
                .ok_or_else(|| ValidationError::MissingCategoryField {
                    category: category.to_string(),
                    field: name.clone(),
                })?;
            fields.push(field_type.coerce(category, name, raw)?);
        }

        Ok(fields)
    }

    /// Build a complete document whose id is the product id.
    pub fn build_document(&self, product: &NormalizedProduct) -> Result<ProductDocument, ValidationError> {
        let fields = self.build_fields(&product.core, &product.core.category, &product.extra)?;
        Ok(ProductDocument::new(product.core.pid.clone(), fields))
    }
}
