use std::fmt;

use crate::store::WriteId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingState {
    Idle,
    Editing,
    WriteInFlight,
}

/// Keystrokes that end an edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKey {
    Confirm,
    Cancel,
}

/// A write the binding wants issued. The caller performs it with `id` as
/// the mutation's write id and reports back through `settle`.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingWrite<V> {
    pub id: WriteId,
    pub value: V,
}

type Validator<V> = Box<dyn Fn(&V) -> bool + Send + Sync>;

/// Edit state of one control bound to one remote field.
///
/// `backed` is the last value seen in a store snapshot and `local` is what
/// the control displays. Outside of an edit and with no write outstanding
/// the two are equal. At most one write is outstanding at a time; commits
/// made meanwhile are dropped.
pub struct FieldBinding<V> {
    backed: V,
    local: V,
    editing: bool,
    in_flight: Option<WriteId>,
    last_write: Option<WriteId>,
    error: Option<String>,
    validator: Option<Validator<V>>,
}

impl<V: Clone + PartialEq> FieldBinding<V> {
    pub fn new(initial: V) -> Self {
        Self {
            backed: initial.clone(),
            local: initial,
            editing: false,
            in_flight: None,
            last_write: None,
            error: None,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: impl Fn(&V) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn state(&self) -> BindingState {
        if self.in_flight.is_some() {
            BindingState::WriteInFlight
        } else if self.editing {
            BindingState::Editing
        } else {
            BindingState::Idle
        }
    }

    /// The value the control displays.
    pub fn value(&self) -> &V {
        &self.local
    }

    pub fn backed_value(&self) -> &V {
        &self.backed
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn is_write_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.validator.as_ref().map_or(true, |validator| validator(&self.local))
    }

    pub fn is_dirty(&self) -> bool {
        self.local != self.backed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn begin_edit(&mut self) {
        self.editing = true;
    }

    /// Records the input even when invalid; `is_valid` reports the problem.
    /// Input implies an edit, so a binding at rest starts editing.
    pub fn on_input(&mut self, value: V) {
        self.editing = true;
        self.local = value;
    }

    /// Ends the edit with a write when the value is valid and changed.
    ///
    /// Returns `None` when nothing is to be written: while a write is
    /// outstanding (the request is dropped), outside an edit, when the value
    /// is invalid (the edit stays open) or when it is unchanged (the edit
    /// closes).
    pub fn commit(&mut self) -> Option<PendingWrite<V>> {
        if self.in_flight.is_some() {
            log::debug!("BINDING COMMIT: dropped, write {:?} outstanding", self.in_flight);
            return None;
        }
        if !self.editing || !self.is_valid() {
            return None;
        }
        if !self.is_dirty() {
            self.editing = false;
            return None;
        }

        let id = WriteId::new();
        self.in_flight = Some(id);
        self.last_write = Some(id);
        self.editing = false;
        self.error = None;
        log::debug!("BINDING COMMIT: write {}", id);
        Some(PendingWrite {
            id,
            value: self.local.clone(),
        })
    }

    /// Focus loss. Commits when possible, otherwise abandons the edit.
    pub fn blur(&mut self) -> Option<PendingWrite<V>> {
        if self.in_flight.is_some() {
            self.editing = false;
            return None;
        }
        let pending = self.commit();
        if pending.is_none() && self.editing {
            self.cancel_edit();
        }
        pending
    }

    pub fn cancel_edit(&mut self) {
        self.local = self.backed.clone();
        self.editing = false;
    }

    pub fn handle_key(&mut self, key: BindingKey) -> Option<PendingWrite<V>> {
        match key {
            BindingKey::Confirm => self.commit(),
            BindingKey::Cancel => {
                self.cancel_edit();
                None
            }
        }
    }

    /// Reports the outcome of the write `id`. Outcomes for any other write
    /// are ignored.
    ///
    /// On failure the edit reopens with the rejected value kept, so the user
    /// can retry or cancel.
    pub fn settle(&mut self, id: WriteId, result: Result<(), String>) {
        if self.in_flight != Some(id) {
            log::debug!("BINDING SETTLE: ignoring stale write {}", id);
            return;
        }
        self.in_flight = None;
        match result {
            Ok(()) => {
                if !self.editing {
                    self.local = self.backed.clone();
                }
            }
            Err(message) => {
                log::debug!("BINDING SETTLE: write {} failed: {}", id, message);
                self.error = Some(message);
                self.editing = true;
            }
        }
    }

    /// A new value for the field arrived from the store.
    ///
    /// Snapshots of this binding's own write are always displayed and close
    /// any edit opened while the write was in flight. Other snapshots update
    /// the backed value and reach the display only while no edit is open.
    pub fn on_external_snapshot(&mut self, value: V, origin: Option<WriteId>) {
        let self_caused = origin.is_some() && origin == self.last_write;
        if self_caused {
            self.last_write = None;
            self.editing = false;
        }
        if self_caused || !self.editing {
            self.local = value.clone();
        }
        self.backed = value;
    }
}

impl<V: fmt::Debug> fmt::Debug for FieldBinding<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("backed", &self.backed)
            .field("local", &self.local)
            .field("editing", &self.editing)
            .field("in_flight", &self.in_flight)
            .field("error", &self.error)
            .finish()
    }
}
