use std::{
    sync::{
        Arc, PoisonError, RwLock, Weak,
        mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel},
    },
    thread,
    time::Duration,
};

struct Observers<Event> {
    next_id: u64,
    senders: Vec<(u64, Sender<Event>)>,
}

/// Fans events out to any number of observers. Each observer gets its own
/// channel and is unregistered when its `Observation` or `ObserverHandle`
/// is dropped. Disconnected channels are also pruned lazily on notify.
pub struct Notifier<Event: Send + Clone + 'static> {
    observers: Arc<RwLock<Observers<Event>>>,
}

impl<Event: Send + Clone + 'static> Clone for Notifier<Event> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

impl<Event: Send + Clone + 'static> Default for Notifier<Event> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Event: Send + Clone + 'static> Notifier<Event> {
    pub fn new() -> Self {
        Self {
            observers: Arc::new(RwLock::new(Observers {
                next_id: 0,
                senders: Vec::new(),
            })),
        }
    }

    pub fn notify(&self, event: Event) {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        observers.senders.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn observer(&self) -> Observation<Event> {
        let (id, rx) = self.register();
        Observation {
            id,
            rx,
            registry: Arc::downgrade(&self.observers),
        }
    }

    /// Runs `callback` on a background thread until the returned handle is
    /// dropped. The observer is registered before `initial` is evaluated, so
    /// an event raised in between is delivered after the initial value
    /// rather than lost.
    pub fn observe_with_initial(
        &self,
        initial: impl FnOnce() -> Event,
        mut callback: impl FnMut(Event) + Send + 'static,
    ) -> ObserverHandle {
        let (id, rx) = self.register();
        let first = initial();
        let registry = Arc::downgrade(&self.observers);
        let handle = ObserverHandle {
            unregister: Some(Box::new(move || remove_observer(&registry, id))),
        };
        thread::spawn(move || {
            std::iter::once(first).chain(rx.iter()).for_each(|e| callback(e));
        });
        handle
    }

    fn register(&self) -> (u64, Receiver<Event>) {
        let (tx, rx) = channel();
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let id = observers.next_id;
        observers.next_id += 1;
        observers.senders.push((id, tx));
        (id, rx)
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }
}

fn remove_observer<Event>(registry: &Weak<RwLock<Observers<Event>>>, id: u64) {
    if let Some(observers) = registry.upgrade() {
        let mut observers = observers.write().unwrap_or_else(PoisonError::into_inner);
        observers.senders.retain(|(observer_id, _)| *observer_id != id);
    }
}

/// Receiving end of a single observer registration.
pub struct Observation<Event> {
    id: u64,
    rx: Receiver<Event>,
    registry: Weak<RwLock<Observers<Event>>>,
}

impl<Event> Observation<Event> {
    pub fn try_recv(&self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl<Event> Drop for Observation<Event> {
    fn drop(&mut self) {
        remove_observer(&self.registry, self.id);
    }
}

/// Keeps a callback observer alive. Dropping it unregisters the observer and
/// lets the callback thread finish.
pub struct ObserverHandle {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl ObserverHandle {
    pub fn unsubscribe(self) {}
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}
