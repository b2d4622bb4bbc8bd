//! Index declarations

use crate::document::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the implicit primary-key index
pub const ID_INDEX: &str = "_id_";

/// Compound index over one or more fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, unique within a collection
    pub name: String,
    /// Indexed fields in key order
    pub keys: Vec<String>,
    /// Whether the index rejects duplicate keys
    pub unique: bool,
}

impl IndexSpec {
    /// Create a non-unique index named after its keys (`a_1_b_1`)
    #[must_use]
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let name = keys
            .iter()
            .map(|k| format!("{k}_1"))
            .collect::<Vec<_>>()
            .join("_");
        Self {
            name,
            keys,
            unique: false,
        }
    }

    /// Mark index as unique
    #[inline]
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Override the generated name
    #[inline]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check if index is over exactly the given fields, in any order
    #[must_use]
    pub fn covers(&self, fields: &[&str]) -> bool {
        self.keys.len() == fields.len() && fields.iter().all(|f| self.keys.iter().any(|k| k == f))
    }

    /// Key tuple of a document under this index (absent fields are null)
    #[must_use]
    pub fn key_of(&self, document: &Document) -> Vec<Value> {
        self.keys
            .iter()
            .map(|k| document.get(k).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_name() {
        let index = IndexSpec::new(["id", "author"]);
        assert_eq!(index.name, "id_1_author_1");
        assert!(!index.unique);
        assert!(index.clone().unique().unique);
    }

    #[test]
    fn covers_ignores_key_order() {
        let index = IndexSpec::new(["author", "id"]);
        assert!(index.covers(&["id", "author"]));
        assert!(!index.covers(&["id"]));
        assert!(!IndexSpec::new(["id", "author", "executedAt"]).covers(&["id", "author"]));
    }

    #[test]
    fn key_of_fills_nulls() {
        let index = IndexSpec::new(["id", "author"]);
        let doc = json!({"id": "init"}).as_object().cloned().unwrap();
        assert_eq!(index.key_of(&doc), vec![json!("init"), Value::Null]);
    }
}
