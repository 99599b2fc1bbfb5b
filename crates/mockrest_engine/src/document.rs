/* 📖 # Why wrap serde_json::Map instead of defining typed records?

The document has no schema: any top-level key may hold an object or an array of
arbitrary records, and the route table is derived from whatever shape is found.
A `serde_json::Map` with `preserve_order` keeps keys in file order, which is the
order resources are mounted in and the order `GET /db` writes them back out.
*/

use serde_json::{Map, Value};

use mockrest_base::MockrestResult;

/// A single record inside a collection, or the body of a singular resource.
pub type Record = Map<String, Value>;

/// The root data tree served by the router.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> MockrestResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(mockrest_base::err!(
                "A document must be a JSON object, got {}",
                json_type_name(&other)
            )),
        }
    }

    /// Parse a document from JSON text.
    pub fn parse(text: &str) -> MockrestResult<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Set a top-level entry, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Top-level entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The records of a collection entry, if `key` holds an array.
    pub fn collection(&self, key: &str) -> Option<&Vec<Value>> {
        self.0.get(key).and_then(Value::as_array)
    }

    pub fn collection_mut(&mut self, key: &str) -> Option<&mut Vec<Value>> {
        self.0.get_mut(key).and_then(Value::as_array_mut)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// The route-relevant shape of a top-level document entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryShape {
    /// A single object, served by the singular router
    Singleton,
    /// An array of records, served by the plural router
    Collection,
    /// Anything else; mounting it is a configuration fault
    Unsupported { type_name: &'static str },
}

/// Classify a top-level entry by its shape.
pub fn classify(value: &Value) -> EntryShape {
    match value {
        Value::Object(_) => EntryShape::Singleton,
        Value::Array(_) => EntryShape::Collection,
        other => EntryShape::Unsupported {
            type_name: json_type_name(other),
        },
    }
}

/// Name of a JSON value's type as used in diagnostics.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_entries() {
        assert_eq!(classify(&json!({"name": "x"})), EntryShape::Singleton);
        assert_eq!(classify(&json!([{"id": 1}])), EntryShape::Collection);
        assert_eq!(classify(&json!([])), EntryShape::Collection);
        assert_eq!(
            classify(&json!(42)),
            EntryShape::Unsupported {
                type_name: "number"
            }
        );
        assert_eq!(
            classify(&json!("text")),
            EntryShape::Unsupported {
                type_name: "string"
            }
        );
        assert_eq!(
            classify(&Value::Null),
            EntryShape::Unsupported { type_name: "null" }
        );
    }

    #[test]
    fn test_parse_preserves_key_order() {
        let document = Document::parse(r#"{"zeta": [], "alpha": {}, "mid": []}"#).unwrap();
        let keys: Vec<_> = document.keys().cloned().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let error = Document::parse("[1, 2]").unwrap_err();
        assert_eq!(error.to_string(), "A document must be a JSON object, got array");
    }

    #[test]
    fn test_collection_access() {
        let mut document = Document::from_value(json!({"posts": [{"id": 1}], "profile": {}})).unwrap();
        assert_eq!(document.collection("posts").map(Vec::len), Some(1));
        assert!(document.collection("profile").is_none());

        document
            .collection_mut("posts")
            .unwrap()
            .push(json!({"id": 2}));
        assert_eq!(document.to_value()["posts"][1]["id"], json!(2));
    }
}
