//! Category schema registry.
//!
//! Maps each category name to the extra fields its documents must carry and
//! the type each field is parsed as.

use std::sync::OnceLock;

use crate::errors::ValidationError;
use product_search_shared::Field;

/// Name of the root of the category tree. Not a selectable category.
pub const ROOT_CATEGORY: &str = "root";

pub const BOOKS: &str = "books";
pub const HD_TELEVISIONS: &str = "hd televisions";

/// Type of a category-specific field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Number,
}

impl FieldType {
    /// Parse a schema type tag.
    pub fn from_tag(field: &str, tag: &str) -> Result<Self, ValidationError> {
        match tag {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            other => Err(ValidationError::UnknownFieldType {
                field: field.to_string(),
                tag: other.to_string(),
            }),
        }
    }

    /// Turn a raw value into a typed field.
    pub fn coerce(&self, category: &str, name: &str, raw: &str) -> Result<Field, ValidationError> {
        match self {
            FieldType::Text => Ok(Field::text(name, raw)),
            FieldType::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|n| Field::number(name, n))
                .ok_or_else(|| ValidationError::InvalidNumber {
                    category: category.to_string(),
                    field: name.to_string(),
                    value: raw.to_string(),
                }),
        }
    }
}

/// Required fields of one category, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySchema {
    pub name: String,
    pub fields: Vec<(String, FieldType)>,
}

/// Immutable set of category schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRegistry {
    schemas: Vec<CategorySchema>,
}

static BUILTIN: OnceLock<CategoryRegistry> = OnceLock::new();

impl CategoryRegistry {
    /// Build a registry from `(category, [(field, type tag)])` declarations.
    ///
    /// Fails on the first unknown type tag.
    pub fn from_tags(declarations: &[(&str, &[(&str, &str)])]) -> Result<Self, ValidationError> {
        let mut schemas = Vec::with_capacity(declarations.len());
        for (category, fields) in declarations {
            let fields = fields
                .iter()
                .map(|(field, tag)| Ok((field.to_string(), FieldType::from_tag(field, tag)?)))
                .collect::<Result<Vec<_>, ValidationError>>()?;
            schemas.push(CategorySchema {
                name: category.to_string(),
                fields,
            });
        }
        Ok(Self { schemas })
    }

    /// The catalog's built-in categories, built once on first use.
    pub fn builtin() -> &'static CategoryRegistry {
        BUILTIN.get_or_init(|| {
            let text = FieldType::Text;
            let number = FieldType::Number;
            let schema = |name: &str, fields: &[(&str, FieldType)]| CategorySchema {
                name: name.to_string(),
                fields: fields
                    .iter()
                    .map(|(field, ty)| (field.to_string(), *ty))
                    .collect(),
            };
            CategoryRegistry {
                schemas: vec![
                    schema(
                        BOOKS,
                        &[
                            ("publisher", text),
                            ("pages", number),
                            ("author", text),
                            ("title", text),
                            ("isbn", text),
                        ],
                    ),
                    schema(
                        HD_TELEVISIONS,
                        &[("size", number), ("brand", text), ("tv_type", text)],
                    ),
                ],
            }
        })
    }

    pub fn schema(&self, category: &str) -> Option<&CategorySchema> {
        self.schemas.iter().find(|s| s.name == category)
    }

    /// Required fields of a category, in order, or `None` for unknown categories.
    pub fn fields_for(&self, category: &str) -> Option<&[(String, FieldType)]> {
        self.schema(category).map(|s| s.fields.as_slice())
    }

    pub fn contains(&self, category: &str) -> bool {
        self.schema(category).is_some()
    }

    /// Ordered `(value, label)` pairs for category selectors.
    pub fn category_menu(&self) -> Vec<(String, String)> {
        self.schemas
            .iter()
            .filter(|s| s.name != ROOT_CATEGORY)
            .map(|s| (s.name.clone(), s.name.clone()))
            .collect()
    }
}
