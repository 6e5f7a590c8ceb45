use std::{
    sync::{Arc, Mutex, MutexGuard, Weak},
    thread::JoinHandle,
};

use anyhow::{Result, anyhow};

use crate::store::{
    ArcStore, DocPath, DocumentStore, DocumentSubscription, Entity, Field, WriteId,
};

use super::{BindingKey, BindingState, FieldBinding, PendingWrite};

struct Mounted<D, V> {
    binding: FieldBinding<V>,
    subscription: DocumentSubscription,
    field: Field<D, V>,
    default: V,
}

impl<D, V: Entity + Clone + PartialEq> Mounted<D, V> {
    /// Feeds queued snapshots to the binding. A missing field reads as the
    /// default; a field that fails to decode is logged and skipped.
    fn pump(&mut self) -> usize {
        let snapshots = self.subscription.drain();
        let count = snapshots.len();
        for snapshot in snapshots {
            match snapshot.get(&self.field) {
                Ok(value) => {
                    let value = value.unwrap_or_else(|| self.default.clone());
                    self.binding.on_external_snapshot(value, snapshot.origin);
                }
                Err(e) => {
                    log::error!("BINDING DECODE ERROR: {} field '{}': {:#}", snapshot.path, self.field.path(), e);
                }
            }
        }
        count
    }
}

/// Result of a write started by a bound field. Dropping the handle detaches
/// the write; it still runs and settles.
pub struct WriteHandle {
    pub id: WriteId,
    handle: JoinHandle<Result<()>>,
}

impl WriteHandle {
    pub fn wait(self) -> Result<()> {
        let id = self.id;
        self.handle
            .join()
            .map_err(|_| anyhow!("Write thread panicked for write {}", id))?
    }
}

/// A `FieldBinding` mounted on one field of a store document. Snapshots are
/// fed to the binding by `pump`, and writes run on their own thread. Once
/// the bound field is dropped, settling writes have nothing to act on and
/// are ignored.
pub struct BoundField<D, V> {
    store: ArcStore,
    doc: DocPath,
    field: Field<D, V>,
    inner: Arc<Mutex<Mounted<D, V>>>,
}

impl<D: 'static, V> BoundField<D, V>
where
    V: Entity + Clone + PartialEq + Send + 'static,
{
    pub fn mount(store: ArcStore, doc: DocPath, field: Field<D, V>, default: V) -> Result<Self> {
        Self::mount_with(store, doc, field, FieldBinding::new(default.clone()), default)
    }

    pub fn mount_validated(
        store: ArcStore,
        doc: DocPath,
        field: Field<D, V>,
        default: V,
        validator: impl Fn(&V) -> bool + Send + Sync + 'static,
    ) -> Result<Self> {
        let binding = FieldBinding::new(default.clone()).with_validator(validator);
        Self::mount_with(store, doc, field, binding, default)
    }

    fn mount_with(
        store: ArcStore,
        doc: DocPath,
        field: Field<D, V>,
        binding: FieldBinding<V>,
        default: V,
    ) -> Result<Self> {
        log::debug!("BINDING MOUNT: {} field '{}'", doc, field.path());
        let subscription = store.subscribe_document(&doc)?;
        let mut mounted = Mounted {
            binding,
            subscription,
            field: field.clone(),
            default,
        };
        mounted.pump();
        Ok(Self {
            store,
            doc,
            field,
            inner: Arc::new(Mutex::new(mounted)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Mounted<D, V>>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("Failed to acquire binding lock"))
    }

    pub fn doc(&self) -> &DocPath {
        &self.doc
    }

    /// Applies snapshots that arrived since the last call.
    pub fn pump(&self) -> Result<usize> {
        Ok(self.lock()?.pump())
    }

    pub fn value(&self) -> Result<V> {
        Ok(self.lock()?.binding.value().clone())
    }

    pub fn backed_value(&self) -> Result<V> {
        Ok(self.lock()?.binding.backed_value().clone())
    }

    pub fn state(&self) -> Result<BindingState> {
        Ok(self.lock()?.binding.state())
    }

    pub fn is_valid(&self) -> Result<bool> {
        Ok(self.lock()?.binding.is_valid())
    }

    pub fn error(&self) -> Result<Option<String>> {
        Ok(self.lock()?.binding.error().map(str::to_string))
    }

    pub fn clear_error(&self) -> Result<()> {
        self.lock()?.binding.clear_error();
        Ok(())
    }

    pub fn begin_edit(&self) -> Result<()> {
        self.lock()?.binding.begin_edit();
        Ok(())
    }

    pub fn on_input(&self, value: V) -> Result<()> {
        self.lock()?.binding.on_input(value);
        Ok(())
    }

    pub fn cancel_edit(&self) -> Result<()> {
        self.lock()?.binding.cancel_edit();
        Ok(())
    }

    pub fn commit(&self) -> Result<Option<WriteHandle>> {
        let pending = self.lock()?.binding.commit();
        Ok(pending.map(|pending| self.spawn_write(pending)))
    }

    pub fn blur(&self) -> Result<Option<WriteHandle>> {
        let pending = self.lock()?.binding.blur();
        Ok(pending.map(|pending| self.spawn_write(pending)))
    }

    pub fn handle_key(&self, key: BindingKey) -> Result<Option<WriteHandle>> {
        let pending = self.lock()?.binding.handle_key(key);
        Ok(pending.map(|pending| self.spawn_write(pending)))
    }

    fn spawn_write(&self, pending: PendingWrite<V>) -> WriteHandle {
        let store = self.store.clone();
        let doc = self.doc.clone();
        let field = self.field.clone();
        let mounted = Arc::downgrade(&self.inner);
        let id = pending.id;

        let handle = std::thread::spawn(move || {
            let result = field
                .update(&doc, &pending.value)
                .and_then(|mutation| store.apply(mutation.with_id(pending.id)));
            let outcome = result.as_ref().map(|_| ()).map_err(|e| format!("{:#}", e));
            settle(&mounted, pending.id, outcome);
            result
        });
        WriteHandle { id, handle }
    }
}

fn settle<D, V>(mounted: &Weak<Mutex<Mounted<D, V>>>, id: WriteId, outcome: Result<(), String>)
where
    V: Entity + Clone + PartialEq,
{
    let Some(mounted) = mounted.upgrade() else {
        log::debug!("BINDING SETTLE: write {} finished after unmount", id);
        return;
    };
    match mounted.lock() {
        Ok(mut mounted) => {
            // The write's own snapshot is already queued; apply it first so
            // the display moves straight to the stored value.
            mounted.pump();
            mounted.binding.settle(id, outcome);
        }
        Err(_) => log::error!("BINDING SETTLE: failed to acquire binding lock for write {}", id),
    };
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        model::ClientConfig,
        store::{DocumentStoreExt, FieldPath, InMemoryStore, SlowStore},
    };

    fn client_doc() -> DocPath {
        DocPath::new("clients", "alice@example.com")
    }

    fn seeded_store() -> Result<ArcStore> {
        let store = ArcStore::new(InMemoryStore::new());
        store.set_as(&client_doc(), &ClientConfig::default())?;
        Ok(store)
    }

    #[test]
    fn mount_reads_current_value() -> Result<()> {
        let store = seeded_store()?;
        store.write_field(&client_doc(), &FieldPath::from_dotted("inventory.inventoryChange"), json!(4))?;
        let bound = BoundField::mount(store, client_doc(), ClientConfig::inventory_change(), 0)?;
        assert_eq!(bound.value()?, 4);
        assert_eq!(bound.state()?, BindingState::Idle);
        Ok(())
    }

    #[test]
    fn missing_document_falls_back_to_default() -> Result<()> {
        let store = ArcStore::new(InMemoryStore::new());
        let bound = BoundField::mount(store, client_doc(), ClientConfig::sms_phone_number(), String::new())?;
        assert_eq!(bound.value()?, "");
        Ok(())
    }

    #[test]
    fn committed_value_reaches_store_and_display() -> Result<()> {
        let store = seeded_store()?;
        let bound = BoundField::mount(store.clone(), client_doc(), ClientConfig::sms_phone_number(), String::new())?;

        bound.on_input("555-123-4567".into())?;
        let write = bound.handle_key(BindingKey::Confirm)?.unwrap();
        write.wait()?;

        let config: ClientConfig = store.get_as(&client_doc())?.unwrap();
        assert_eq!(config.preferences.notifications.sms.phone_number, "555-123-4567");
        assert_eq!(bound.state()?, BindingState::Idle);
        assert_eq!(bound.value()?, "555-123-4567");
        assert_eq!(bound.backed_value()?, "555-123-4567");
        Ok(())
    }

    #[test]
    fn second_commit_during_slow_write_is_dropped() -> Result<()> {
        let slow = SlowStore::new(seeded_store()?, 0, 100);
        let bound = BoundField::mount(ArcStore::new(slow), client_doc(), ClientConfig::has_paid(), false)?;

        bound.on_input(true)?;
        let write = bound.commit()?.unwrap();
        assert_eq!(bound.state()?, BindingState::WriteInFlight);

        bound.on_input(false)?;
        assert!(bound.commit()?.is_none());
        write.wait()?;
        assert!(bound.backed_value()?);
        Ok(())
    }

    #[test]
    fn rejected_write_surfaces_error() -> Result<()> {
        let slow = SlowStore::new(seeded_store()?, 0, 0);
        slow.set_fail_writes(true);
        let bound = BoundField::mount(ArcStore::new(slow), client_doc(), ClientConfig::inventory_change(), 1)?;

        bound.on_input(3)?;
        assert!(bound.blur()?.unwrap().wait().is_err());
        assert!(bound.error()?.unwrap().contains("rejected"));
        assert_eq!(bound.value()?, 3);
        assert_eq!(bound.state()?, BindingState::Editing);
        Ok(())
    }

    #[test]
    fn external_change_reaches_idle_binding() -> Result<()> {
        let store = seeded_store()?;
        let bound = BoundField::mount(store.clone(), client_doc(), ClientConfig::has_paid(), false)?;
        store.apply(ClientConfig::has_paid().update(&client_doc(), &true)?)?;
        assert_eq!(bound.pump()?, 1);
        assert!(bound.value()?);
        Ok(())
    }

    #[test]
    fn write_settling_after_unmount_is_harmless() -> Result<()> {
        let store = seeded_store()?;
        let slow = SlowStore::new(store.clone(), 0, 50);
        let bound = BoundField::mount(ArcStore::new(slow), client_doc(), ClientConfig::has_paid(), false)?;
        bound.on_input(true)?;
        let write = bound.commit()?.unwrap();
        drop(bound);

        write.wait()?;
        let config: ClientConfig = store.get_as(&client_doc())?.unwrap();
        assert!(config.accounting.has_paid);
        Ok(())
    }
}
