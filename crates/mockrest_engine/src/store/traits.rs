/* 📖 # Why a DocumentStore trait?

The router does not care where the document lives. An in-memory store serves tests
and embedders that pass a document directly; the JSON file store loads a file at
startup and rewrites it after every mutation. Both hand out the same `Document`
and differ only in what `write` does.
*/

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use mockrest_base::MockrestResult;

use crate::document::Document;

/// Backing storage for the served document.
pub trait DocumentStore: Send + Sync + 'static {
    /// The current document.
    fn document(&self) -> &Document;

    /// Mutable access to the document. Changes are persisted by `write`.
    fn document_mut(&mut self) -> &mut Document;

    /// Persist the current document. A no-op for purely in-memory stores.
    fn write(&mut self) -> MockrestResult<()>;

    /// Short human readable description of the backing storage.
    fn describe(&self) -> String;
}

/// Shared handle to the document store.
///
/// Clones share the same store. The handle also carries the name of the identity
/// field used by the [`IdentityStore`](crate::store::IdentityStore) operations.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<dyn DocumentStore>>,
    id_field: Arc<str>,
}

impl StoreHandle {
    /// Wrap a store, using `id` as identity field.
    pub fn new<S: DocumentStore>(store: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
            id_field: Arc::from("id"),
        }
    }

    /// A handle to the same store using a different identity field.
    pub fn with_id_field(&self, id_field: &str) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            id_field: Arc::from(id_field),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Snapshot of the whole document.
    pub fn state(&self) -> Document {
        self.inner.read().document().clone()
    }

    /// Snapshot of one top-level entry.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().document().get(key).cloned()
    }

    /// Replace one top-level entry and persist the document.
    pub fn set(&self, key: &str, value: Value) -> MockrestResult<()> {
        self.mutate(|document| {
            document.insert(key, value);
            Ok(())
        })
    }

    /// Run `f` with shared access to the document.
    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(self.inner.read().document())
    }

    /// Run `f` with exclusive access to the document, then persist it if `f` succeeded.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> MockrestResult<R>) -> MockrestResult<R> {
        let mut store = self.inner.write();
        let result = f(store.document_mut())?;
        store.write()?;
        Ok(result)
    }

    /// Persist the current document.
    pub fn write(&self) -> MockrestResult<()> {
        self.inner.write().write()
    }

    /// Prepare a traversal calling `f(value, key)` for every top-level entry.
    ///
    /// Nothing runs until the traversal is finalized with [`Traversal::value`].
    /// Entries are taken from a snapshot of the document at this call.
    pub fn for_each<F>(&self, f: F) -> Traversal<F>
    where
        F: FnMut(&Value, &str) -> MockrestResult<()>,
    {
        let entries = self.read(|document| {
            document
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        });
        Traversal {
            entries,
            callback: f,
        }
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self
            .inner
            .try_read()
            .map_or_else(|| "<locked>".to_string(), |store| store.describe());
        f.debug_struct("StoreHandle")
            .field("store", &store)
            .field("id_field", &self.id_field)
            .finish()
    }
}

/// A pending traversal over the top-level entries of a document.
#[must_use = "a traversal does nothing until `.value()` is called"]
pub struct Traversal<F> {
    entries: Vec<(String, Value)>,
    callback: F,
}

impl<F> Traversal<F>
where
    F: FnMut(&Value, &str) -> MockrestResult<()>,
{
    /// Run the callback for every entry in document order, stopping at the first error.
    pub fn value(mut self) -> MockrestResult<()> {
        for (key, value) in &self.entries {
            (self.callback)(value, key)?;
        }
        Ok(())
    }
}
