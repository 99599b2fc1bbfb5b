use mockrest_base::MockrestResult;

use crate::document::Document;
use crate::store::traits::DocumentStore;

/// A document store that only lives in memory.
///
/// Mutations are visible to subsequent requests but never persisted.
///
/// # Example
///
/// ```
/// use mockrest_engine::{Document, DocumentStore, InMemoryStore};
///
/// let document = Document::parse(r#"{"posts": []}"#).unwrap();
/// let store = InMemoryStore::new(document);
/// assert!(store.document().collection("posts").is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    document: Document,
}

impl InMemoryStore {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl DocumentStore for InMemoryStore {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn write(&mut self) -> MockrestResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
