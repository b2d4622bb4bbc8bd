//! Document representation
//!
//! Documents are JSON objects. Typed records convert through serde.

use crate::error::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// A stored document: a JSON object keyed by field name
pub type Document = serde_json::Map<String, Value>;

/// Primary identifier field, implicitly unique within a collection
pub const ID_FIELD: &str = "_id";

/// Serialize a typed record into a document
///
/// # Errors
/// Returns [`StoreError::Serialization`] if the value does not serialize to
/// a JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::NotADocument(type_name(&other))),
    }
}

/// Deserialize a document into a typed record
///
/// # Errors
/// Returns [`StoreError::Serialization`] if the fields do not match `T`.
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: String,
        count: u32,
    }

    #[test]
    fn typed_record_converts_both_ways() {
        let row = Row {
            id: "a".to_string(),
            count: 3,
        };
        let doc = to_document(&row).unwrap();
        assert_eq!(doc.get("count"), Some(&Value::from(3)));
        assert_eq!(from_document::<Row>(doc).unwrap(), row);
    }

    #[test]
    fn scalar_is_not_a_document() {
        let err = to_document(&42u32).unwrap_err();
        assert!(matches!(err, StoreError::NotADocument("number")));
    }
}
