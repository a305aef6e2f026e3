//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the product search index.

use serde_json::{json, Value};

/// Default alias the catalog reads and writes through.
pub const DEFAULT_INDEX_ALIAS: &str = "productsearch1";

/// Source field holding the typed field list, used to rebuild documents on read.
pub const TYPED_FIELDS_KEY: &str = "doc_fields";

/// Source field mirroring the document id, used for id scans.
pub const DOC_ID_KEY: &str = "doc_id";

/// Index alias plus the mapping version behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub alias: String,
    pub version: u32,
}

impl IndexConfig {
    pub fn new(alias: impl Into<String>, version: u32) -> Self {
        Self {
            alias: alias.into(),
            version,
        }
    }

    /// Concrete index name the alias points at, e.g. `productsearch1_v0`.
    pub fn versioned_name(&self) -> String {
        format!("{}_v{}", self.alias, self.version)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_ALIAS, 0)
    }
}

/// Get the index settings and mappings for the product search index.
///
/// Core fields are mapped explicitly. Category-specific attributes fall
/// through to dynamic mapping. The typed field list is stored but not indexed.
pub fn get_index_settings(config: &IndexConfig) -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "aliases": {
            (config.alias.clone()): {}
        },
        "mappings": {
            "properties": {
                DOC_ID_KEY: {
                    "type": "keyword"
                },
                "pid": {
                    "type": "keyword"
                },
                "name": {
                    "type": "text",
                    "fields": {
                        "raw": {
                            "type": "keyword"
                        }
                    }
                },
                "description": {
                    "type": "text"
                },
                "category": {
                    "type": "keyword"
                },
                "ar": {
                    "type": "float"
                },
                "price": {
                    "type": "float"
                },
                "modified": {
                    "type": "date",
                    "format": "yyyy-MM-dd"
                },
                TYPED_FIELDS_KEY: {
                    "type": "object",
                    "enabled": false
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_settings_structure() {
        let config = IndexConfig::default();
        let settings = get_index_settings(&config);

        assert!(settings["settings"]["number_of_shards"].is_number());
        assert!(settings["aliases"]["productsearch1"].is_object());

        let properties = &settings["mappings"]["properties"];
        assert_eq!(properties["pid"]["type"], "keyword");
        assert_eq!(properties["category"]["type"], "keyword");
        assert_eq!(properties["ar"]["type"], "float");
        assert_eq!(properties["name"]["fields"]["raw"]["type"], "keyword");
        assert_eq!(properties[TYPED_FIELDS_KEY]["enabled"], false);
    }

    #[test]
    fn test_versioned_name() {
        assert_eq!(IndexConfig::new("products", 3).versioned_name(), "products_v3");
    }
}
