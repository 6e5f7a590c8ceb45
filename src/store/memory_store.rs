use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use anyhow::Result;
use serde_json::Value;

use crate::notifier::Notifier;

use super::{
    CollectionSubscription, DocPath, DocumentStore, DocumentSubscription, Mutation, StoreEvent,
};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    docs: Arc<RwLock<HashMap<DocPath, Value>>>,
    feed: Notifier<StoreEvent>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer_count(&self) -> usize {
        self.feed.observer_count()
    }
}

impl DocumentStore for InMemoryStore {
    fn apply(&self, mutation: Mutation) -> Result<()> {
        log::debug!("STORE WRITE: {} id={}", mutation.describe(), mutation.id);
        let mut docs = self
            .docs
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock"))?;
        let data = mutation.apply_to(docs.get(&mutation.path).cloned())?;
        match &data {
            Some(value) => docs.insert(mutation.path.clone(), value.clone()),
            None => docs.remove(&mutation.path),
        };
        // Notify under the lock so subscribers see writes in commit order.
        self.feed.notify(StoreEvent::Changed {
            path: mutation.path,
            data,
            origin: mutation.id,
        });
        Ok(())
    }

    fn get_document(&self, path: &DocPath) -> Result<Option<Value>> {
        log::debug!("STORE GET: path='{}'", path);
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire read lock"))?;
        Ok(docs.get(path).cloned())
    }

    fn list_collection(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        log::debug!("STORE LIST: collection='{}'", collection);
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire read lock"))?;
        let mut results: Vec<(String, Value)> = docs
            .iter()
            .filter(|(path, _)| path.collection == collection)
            .map(|(path, value)| (path.id.clone(), value.clone()))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        log::debug!("STORE LIST RESULT: {} documents", results.len());
        Ok(results)
    }

    fn subscribe_document(&self, path: &DocPath) -> Result<DocumentSubscription> {
        DocumentSubscription::open(&self.feed, path, || self.get_document(path))
    }

    fn subscribe_collection(&self, collection: &str) -> Result<CollectionSubscription> {
        CollectionSubscription::open(&self.feed, collection, || self.list_collection(collection))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    use serde_json::json;

    use super::*;
    use crate::store::FieldPath;

    #[test]
    fn set_then_get_round_trips() -> Result<()> {
        let store = InMemoryStore::new();
        let path = DocPath::new("clients", "alice@example.com");
        let doc = json!({ "accounting": { "hasPaid": false, "plan": "" } });
        store.set_document(&path, doc.clone())?;
        assert_eq!(store.get_document(&path)?, Some(doc));
        Ok(())
    }

    #[test]
    fn write_field_on_missing_document_fails() {
        let store = InMemoryStore::new();
        let path = DocPath::new("clients", "nobody@example.com");
        let result = store.write_field(&path, &FieldPath::from_dotted("accounting.hasPaid"), json!(true));
        assert!(result.is_err());
        assert_eq!(store.get_document(&path).unwrap(), None);
    }

    #[test]
    fn subscription_delivers_initial_then_changes() -> Result<()> {
        let store = InMemoryStore::new();
        let path = DocPath::new("admin", "health_monitor");
        store.set_document(&path, json!({ "reset": false }))?;

        let mut subscription = store.subscribe_document(&path)?;
        let initial = subscription.try_next().unwrap();
        assert_eq!(initial.data, Some(json!({ "reset": false })));
        assert_eq!(initial.origin, None);

        let mutation = Mutation::update(path.clone(), FieldPath::from_dotted("reset"), json!(true));
        let write_id = mutation.id;
        store.apply(mutation)?;

        let changed = subscription.next_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(changed.data, Some(json!({ "reset": true })));
        assert!(changed.is_from(write_id));
        Ok(())
    }

    #[test]
    fn subscription_ignores_other_documents() -> Result<()> {
        let store = InMemoryStore::new();
        let watched = DocPath::new("clients", "a@example.com");
        let mut subscription = store.subscribe_document(&watched)?;
        assert_eq!(subscription.try_next().unwrap().data, None);

        store.set_document(&DocPath::new("clients", "b@example.com"), json!({}))?;
        assert!(subscription.try_next().is_none());
        Ok(())
    }

    #[test]
    fn collection_subscription_tracks_adds_and_deletes() -> Result<()> {
        let store = InMemoryStore::new();
        store.set_document(&DocPath::new("clients", "b@example.com"), json!({ "n": 2 }))?;
        let mut subscription = store.subscribe_collection("clients")?;
        assert_eq!(subscription.try_next().unwrap().ids(), vec!["b@example.com"]);

        store.set_document(&DocPath::new("clients", "a@example.com"), json!({ "n": 1 }))?;
        store.delete_document(&DocPath::new("clients", "b@example.com"))?;
        store.set_document(&DocPath::new("admin", "health_monitor"), json!({}))?;

        let latest = subscription.latest().unwrap();
        assert_eq!(latest.ids(), vec!["a@example.com"]);
        Ok(())
    }

    #[test]
    fn dropping_subscription_unregisters_observer() -> Result<()> {
        let store = InMemoryStore::new();
        {
            let _subscription = store.subscribe_document(&DocPath::new("clients", "a@example.com"))?;
            assert_eq!(store.observer_count(), 1);
        }
        assert_eq!(store.observer_count(), 0);
        Ok(())
    }

    #[test]
    fn concurrent_sibling_writes_reach_subscribers_in_commit_order() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        let path = DocPath::new("clients", "alice@example.com");
        for round in 0..500 {
            store.set_document(&path, json!({}))?;
            let mut subscription = store.subscribe_document(&path)?;
            let barrier = Arc::new(Barrier::new(2));
            let writers: Vec<_> = ["a", "b"]
                .into_iter()
                .map(|field| {
                    let store = store.clone();
                    let path = path.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        store.write_field(&path, &FieldPath::from_dotted(field), json!(round))
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap()?;
            }

            let last = subscription.drain().pop().unwrap();
            assert_eq!(last.data, store.get_document(&path)?, "round {}", round);
        }
        Ok(())
    }
}
