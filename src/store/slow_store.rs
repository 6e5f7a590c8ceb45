use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use serde_json::Value;

use super::{
    ArcStore, CollectionSubscription, DocPath, DocumentStore, DocumentSubscription, Mutation,
};

/// Wraps a store with artificial delays to simulate a high-latency remote
/// document store, and can be switched to reject writes.
#[derive(Clone)]
pub struct SlowStore {
    inner: ArcStore,
    read_delay_ms: u64,
    write_delay_ms: u64,
    fail_writes: Arc<AtomicBool>,
}

impl SlowStore {
    pub fn new(inner: ArcStore, read_delay_ms: u64, write_delay_ms: u64) -> Self {
        Self {
            inner,
            read_delay_ms,
            write_delay_ms,
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Latency in the range of a hosted document database
    pub fn remote_like(inner: ArcStore) -> Self {
        Self::new(inner, 25, 250)
    }

    /// While set, every write waits out its delay and then fails without
    /// touching the inner store.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DocumentStore for SlowStore {
    fn apply(&self, mutation: Mutation) -> Result<()> {
        log::debug!("SLOW STORE WRITE: {} (delay: {}ms)", mutation.describe(), self.write_delay_ms);
        std::thread::sleep(Duration::from_millis(self.write_delay_ms));
        if self.fail_writes.load(Ordering::SeqCst) {
            log::debug!("SLOW STORE WRITE RESULT: rejected");
            anyhow::bail!("Write rejected by store: {}", mutation.describe());
        }
        self.inner.apply(mutation)
    }

    fn get_document(&self, path: &DocPath) -> Result<Option<Value>> {
        log::debug!("SLOW STORE GET: path='{}' (delay: {}ms)", path, self.read_delay_ms);
        std::thread::sleep(Duration::from_millis(self.read_delay_ms));
        self.inner.get_document(path)
    }

    fn list_collection(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        log::debug!("SLOW STORE LIST: collection='{}' (delay: {}ms)", collection, self.read_delay_ms);
        std::thread::sleep(Duration::from_millis(self.read_delay_ms));
        self.inner.list_collection(collection)
    }

    fn subscribe_document(&self, path: &DocPath) -> Result<DocumentSubscription> {
        self.inner.subscribe_document(path)
    }

    fn subscribe_collection(&self, collection: &str) -> Result<CollectionSubscription> {
        self.inner.subscribe_collection(collection)
    }
}
