use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use include_dir::{Dir, include_dir};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use rusqlite_migration::Migrations;
use serde::Deserialize;
use serde_json::Value;

use crate::notifier::Notifier;

use super::{
    CollectionSubscription, DocPath, DocumentStore, DocumentSubscription, Mutation, StoreEvent,
};

static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

#[derive(Deserialize)]
struct DocumentRow {
    id: String,
    body: String,
}

/// Document store persisted in SQLite. Each document is one row holding its
/// JSON body; partial writes read, patch and rewrite the body inside a
/// transaction.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    feed: Notifier<StoreEvent>,
    // Held from transaction start until subscribers are notified.
    write_order: Arc<Mutex<()>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(|conn| conn.pragma_update(None, "journal_mode", "WAL"));
        let pool = Pool::builder()
            .build(manager)
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        Self::from_pool(pool)
    }

    /// Each in-memory connection is its own database, so the pool is
    /// limited to a single connection.
    pub fn open_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self> {
        let store = Self {
            pool,
            feed: Notifier::new(),
            write_order: Arc::new(Mutex::new(())),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let migrations = Migrations::from_directory(&MIGRATIONS_DIR)?;
        let mut conn = self.pool.get()?;
        migrations.to_latest(&mut conn)?;
        Ok(())
    }

    pub fn observer_count(&self) -> usize {
        self.feed.observer_count()
    }
}

impl DocumentStore for SqliteStore {
    fn apply(&self, mutation: Mutation) -> Result<()> {
        log::debug!("STORE WRITE: {} id={}", mutation.describe(), mutation.id);
        let _order = self
            .write_order
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write order lock"))?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![mutation.path.collection, mutation.path.id],
                |row| row.get(0),
            )
            .optional()?;
        let current = match current.map(|body| serde_json::from_str::<Value>(&body)).transpose() {
            Ok(current) => current,
            Err(e) => {
                // Subscribers hear about it too, the writer gets the error.
                self.feed.notify(StoreEvent::Failed {
                    path: mutation.path.clone(),
                    message: e.to_string(),
                });
                return Err(anyhow::Error::new(e).context(format!("Corrupt document body at {}", mutation.path)));
            }
        };

        let next = mutation.apply_to(current)?;
        match &next {
            Some(value) => {
                tx.execute(
                    "INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                    params![
                        mutation.path.collection,
                        mutation.path.id,
                        serde_json::to_string(value)?,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    params![mutation.path.collection, mutation.path.id],
                )?;
            }
        }
        tx.commit()?;
        drop(conn);

        self.feed.notify(StoreEvent::Changed {
            path: mutation.path,
            data: next,
            origin: mutation.id,
        });
        Ok(())
    }

    fn get_document(&self, path: &DocPath) -> Result<Option<Value>> {
        log::debug!("STORE GET: path='{}'", path);
        let conn = self.pool.get()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![path.collection, path.id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|body| serde_json::from_str(&body))
            .transpose()
            .with_context(|| format!("Corrupt document body at {}", path))
    }

    fn list_collection(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        log::debug!("STORE LIST: collection='{}'", collection);
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")?;
        let rows = serde_rusqlite::from_rows::<DocumentRow>(stmt.query([collection])?);

        let mut results = Vec::new();
        for row in rows {
            let row = row?;
            let body = serde_json::from_str(&row.body)
                .with_context(|| format!("Corrupt document body at {}/{}", collection, row.id))?;
            results.push((row.id, body));
        }
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
    use std::{sync::Barrier, thread};

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::store::FieldPath;

    #[test]
    fn open_memory() -> Result<()> {
        let _ = SqliteStore::open_memory()?;
        Ok(())
    }

    #[test]
    fn partial_writes_patch_the_stored_body() -> Result<()> {
        let store = SqliteStore::open_memory()?;
        let path = DocPath::new("clients", "alice@example.com");
        store.set_document(&path, json!({ "inventory": { "items": {} } }))?;
        store.write_field(
            &path,
            &FieldPath::from_segments(["inventory", "items", "12345"]),
            json!({ "action": "TRACKING", "name": "", "available": 0 }),
        )?;
        store.delete_field(&path, &FieldPath::from_dotted("inventory.missing"))?;

        let doc = store.get_document(&path)?.unwrap();
        assert_eq!(doc["inventory"]["items"]["12345"]["action"], "TRACKING");
        Ok(())
    }

    #[test]
    fn failed_write_leaves_no_row() -> Result<()> {
        let store = SqliteStore::open_memory()?;
        let path = DocPath::new("clients", "ghost@example.com");
        assert!(store.write_field(&path, &FieldPath::from_dotted("a"), json!(1)).is_err());
        assert!(store.list_collection("clients")?.is_empty());
        Ok(())
    }

    #[test]
    fn corrupt_body_fails_write_and_skips_snapshot() -> Result<()> {
        let store = SqliteStore::open_memory()?;
        let path = DocPath::new("clients", "alice@example.com");
        store.set_document(&path, json!({}))?;
        let mut subscription = store.subscribe_document(&path)?;
        assert_eq!(subscription.drain().len(), 1);

        store.pool.get()?.execute(
            "UPDATE documents SET body = 'not json' WHERE collection = ?1 AND id = ?2",
            params![path.collection, path.id],
        )?;
        assert!(store.write_field(&path, &FieldPath::from_dotted("a"), json!(1)).is_err());
        assert!(subscription.drain().is_empty());
        Ok(())
    }

    #[test]
    fn documents_survive_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("stockdesk.sqlite");
        let path = DocPath::new("admin", "health_monitor");
        {
            let store = SqliteStore::open(&db_path)?;
            store.set_document(&path, json!({ "reset": true }))?;
        }
        let store = SqliteStore::open(&db_path)?;
        assert_eq!(store.get_document(&path)?, Some(json!({ "reset": true })));
        Ok(())
    }

    #[test]
    fn list_collection_orders_by_id() -> Result<()> {
        let store = SqliteStore::open_memory()?;
        store.set_document(&DocPath::new("clients", "b@example.com"), json!({}))?;
        store.set_document(&DocPath::new("clients", "a@example.com"), json!({}))?;
        store.set_document(&DocPath::new("admin", "health_monitor"), json!({}))?;
        let ids: Vec<String> = store.list_collection("clients")?.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a@example.com", "b@example.com"]);
        Ok(())
    }

    #[test]
    fn concurrent_sibling_writes_reach_subscribers_in_commit_order() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SqliteStore::open(temp_dir.path().join("stockdesk.sqlite"))?;
        let path = DocPath::new("clients", "alice@example.com");
        for round in 0..100 {
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
