use std::sync::Arc;

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{CollectionSubscription, DocPath, DocumentSubscription, FieldPath, Mutation};

/// Trait for types that can be stored as a document or a document field
pub trait Entity: Serialize + DeserializeOwned {}

// Blanket implementation for any type that meets the requirements
impl<T> Entity for T where T: Serialize + DeserializeOwned {}

/// Capabilities of the document store the dashboard runs against. Every
/// mutation is applied atomically per document and announced to
/// subscribers with the mutation's `WriteId`.
pub trait DocumentStore: Send + Sync {
    fn apply(&self, mutation: Mutation) -> Result<()>;

    fn get_document(&self, path: &DocPath) -> Result<Option<Value>>;

    /// Returns `(id, body)` pairs ordered by id.
    fn list_collection(&self, collection: &str) -> Result<Vec<(String, Value)>>;

    fn subscribe_document(&self, path: &DocPath) -> Result<DocumentSubscription>;

    fn subscribe_collection(&self, collection: &str) -> Result<CollectionSubscription>;

    fn set_document(&self, path: &DocPath, value: Value) -> Result<()> {
        self.apply(Mutation::set(path.clone(), value))
    }

    fn write_field(&self, path: &DocPath, field: &FieldPath, value: Value) -> Result<()> {
        self.apply(Mutation::update(path.clone(), field.clone(), value))
    }

    fn delete_document(&self, path: &DocPath) -> Result<()> {
        self.apply(Mutation::delete(path.clone()))
    }

    fn delete_field(&self, path: &DocPath, field: &FieldPath) -> Result<()> {
        self.apply(Mutation::delete_field(path.clone(), field.clone()))
    }
}

/// Typed convenience methods over any `DocumentStore`.
pub trait DocumentStoreExt: DocumentStore {
    fn get_as<D: Entity>(&self, path: &DocPath) -> Result<Option<D>> {
        match self.get_document(path)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn set_as<D: Entity>(&self, path: &DocPath, doc: &D) -> Result<()> {
        self.set_document(path, serde_json::to_value(doc)?)
    }
}

impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

// Shared handle so one store can be passed to every component that needs it
#[derive(Clone)]
pub struct ArcStore {
    inner: Arc<dyn DocumentStore>,
}

impl ArcStore {
    pub fn new(store: impl DocumentStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    pub fn from_arc(inner: Arc<dyn DocumentStore>) -> Self {
        Self { inner }
    }
}

impl DocumentStore for ArcStore {
    fn apply(&self, mutation: Mutation) -> Result<()> {
        self.inner.apply(mutation)
    }

    fn get_document(&self, path: &DocPath) -> Result<Option<Value>> {
        self.inner.get_document(path)
    }

    fn list_collection(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        self.inner.list_collection(collection)
    }

    fn subscribe_document(&self, path: &DocPath) -> Result<DocumentSubscription> {
        self.inner.subscribe_document(path)
    }

    fn subscribe_collection(&self, collection: &str) -> Result<CollectionSubscription> {
        self.inner.subscribe_collection(collection)
    }
}
