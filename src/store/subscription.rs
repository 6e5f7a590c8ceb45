use std::{
    collections::{BTreeMap, VecDeque},
    time::{Duration, Instant},
};

use anyhow::Result;
use serde_json::Value;

use crate::notifier::{Notifier, Observation};

use super::{CollectionSnapshot, DocPath, DocumentSnapshot, StoreEvent, WriteId};

/// Live view of one document. The current state is delivered first, then
/// one snapshot per change in write order. Dropping the subscription
/// unsubscribes it.
pub struct DocumentSubscription {
    path: DocPath,
    pending: VecDeque<DocumentSnapshot>,
    events: Observation<StoreEvent>,
}

impl DocumentSubscription {
    /// Registers on `feed` before loading the current state so no change
    /// between the two is lost.
    pub fn open(
        feed: &Notifier<StoreEvent>,
        path: &DocPath,
        load: impl FnOnce() -> Result<Option<Value>>,
    ) -> Result<Self> {
        let events = feed.observer();
        let initial = DocumentSnapshot::initial(path.clone(), load()?);
        Ok(Self {
            path: path.clone(),
            pending: VecDeque::from([initial]),
            events,
        })
    }

    pub fn path(&self) -> &DocPath {
        &self.path
    }

    pub fn try_next(&mut self) -> Option<DocumentSnapshot> {
        if let Some(snapshot) = self.pending.pop_front() {
            return Some(snapshot);
        }
        while let Some(event) = self.events.try_recv() {
            if let Some(snapshot) = self.accept(event) {
                return Some(snapshot);
            }
        }
        None
    }

    pub fn next_timeout(&mut self, timeout: Duration) -> Option<DocumentSnapshot> {
        if let Some(snapshot) = self.pending.pop_front() {
            return Some(snapshot);
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = self.events.recv_timeout(remaining)?;
            if let Some(snapshot) = self.accept(event) {
                return Some(snapshot);
            }
        }
    }

    pub fn drain(&mut self) -> Vec<DocumentSnapshot> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    pub fn unsubscribe(self) {}

    fn accept(&self, event: StoreEvent) -> Option<DocumentSnapshot> {
        match event {
            StoreEvent::Changed { path, data, origin } if path == self.path => Some(DocumentSnapshot {
                path,
                data,
                origin: Some(origin),
            }),
            StoreEvent::Failed { path, message } if path == self.path => {
                log::error!("SUBSCRIPTION ERROR: path='{}' {}", path, message);
                None
            }
            _ => None,
        }
    }
}

/// Live view of a whole collection. Keeps its own copy of the documents
/// and emits the full collection after each change.
pub struct CollectionSubscription {
    collection: String,
    docs: BTreeMap<String, Value>,
    pending: VecDeque<CollectionSnapshot>,
    events: Observation<StoreEvent>,
}

impl CollectionSubscription {
    pub fn open(
        feed: &Notifier<StoreEvent>,
        collection: &str,
        load: impl FnOnce() -> Result<Vec<(String, Value)>>,
    ) -> Result<Self> {
        let events = feed.observer();
        let docs: BTreeMap<String, Value> = load()?.into_iter().collect();
        let mut subscription = Self {
            collection: collection.to_string(),
            docs,
            pending: VecDeque::new(),
            events,
        };
        let initial = subscription.snapshot(None);
        subscription.pending.push_back(initial);
        Ok(subscription)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn try_next(&mut self) -> Option<CollectionSnapshot> {
        if let Some(snapshot) = self.pending.pop_front() {
            return Some(snapshot);
        }
        while let Some(event) = self.events.try_recv() {
            if let Some(snapshot) = self.accept(event) {
                return Some(snapshot);
            }
        }
        None
    }

    pub fn next_timeout(&mut self, timeout: Duration) -> Option<CollectionSnapshot> {
        if let Some(snapshot) = self.pending.pop_front() {
            return Some(snapshot);
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = self.events.recv_timeout(remaining)?;
            if let Some(snapshot) = self.accept(event) {
                return Some(snapshot);
            }
        }
    }

    /// Drains pending changes and returns only the most recent snapshot.
    pub fn latest(&mut self) -> Option<CollectionSnapshot> {
        std::iter::from_fn(|| self.try_next()).last()
    }

    pub fn unsubscribe(self) {}

    fn accept(&mut self, event: StoreEvent) -> Option<CollectionSnapshot> {
        match event {
            StoreEvent::Changed { path, data, origin } if path.collection == self.collection => {
                match data {
                    Some(data) => self.docs.insert(path.id, data),
                    None => self.docs.remove(&path.id),
                };
                Some(self.snapshot(Some(origin)))
            }
            StoreEvent::Failed { path, message } if path.collection == self.collection => {
                log::error!("SUBSCRIPTION ERROR: collection='{}' path='{}' {}", self.collection, path, message);
                None
            }
            _ => None,
        }
    }

    fn snapshot(&self, origin: Option<WriteId>) -> CollectionSnapshot {
        let docs = self
            .docs
            .iter()
            .map(|(id, data)| DocumentSnapshot {
                path: DocPath::new(self.collection.clone(), id.clone()),
                data: Some(data.clone()),
                origin,
            })
            .collect();
        CollectionSnapshot {
            collection: self.collection.clone(),
            docs,
            origin,
        }
    }
}
