use anyhow::Result;
use serde_json::Value;

use super::{DocPath, Entity, Field, WriteId};

/// Sent by a store to its subscribers after every applied mutation, or when
/// a change could not be turned into a snapshot.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    Changed {
        path: DocPath,
        data: Option<Value>,
        origin: WriteId,
    },
    Failed {
        path: DocPath,
        message: String,
    },
}

/// State of one document as delivered to a subscriber.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    pub path: DocPath,
    pub data: Option<Value>,
    /// The write that produced this snapshot. `None` for the first snapshot
    /// of a subscription.
    pub origin: Option<WriteId>,
}

impl DocumentSnapshot {
    pub fn initial(path: DocPath, data: Option<Value>) -> Self {
        Self {
            path,
            data,
            origin: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn id(&self) -> &str {
        &self.path.id
    }

    pub fn get<D, V: Entity>(&self, field: &Field<D, V>) -> Result<Option<V>> {
        match &self.data {
            Some(data) => field.read(data),
            None => Ok(None),
        }
    }

    pub fn decode<D: Entity>(&self) -> Result<Option<D>> {
        match &self.data {
            Some(data) => Ok(Some(serde_json::from_value(data.clone())?)),
            None => Ok(None),
        }
    }

    pub fn is_from(&self, write: WriteId) -> bool {
        self.origin == Some(write)
    }
}

/// All documents of a collection, ordered by id.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionSnapshot {
    pub collection: String,
    pub docs: Vec<DocumentSnapshot>,
    pub origin: Option<WriteId>,
}

impl CollectionSnapshot {
    pub fn ids(&self) -> Vec<&str> {
        self.docs.iter().map(DocumentSnapshot::id).collect()
    }

    pub fn get(&self, id: &str) -> Option<&DocumentSnapshot> {
        self.docs.iter().find(|doc| doc.id() == id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
