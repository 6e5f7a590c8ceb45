use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};

use anyhow::Result;

type Operation<I, O> = dyn Fn(I) -> Result<O> + Send + Sync;

struct ActionState<I, O> {
    name: String,
    operation: Box<Operation<I, O>>,
    running: AtomicBool,
    error: Mutex<Option<String>>,
}

/// Runs one user-triggered operation at a time and keeps the message of
/// its most recent failure until cleared. Clones share the same state.
pub struct AsyncAction<I, O> {
    state: Arc<ActionState<I, O>>,
}

impl<I, O> Clone for AsyncAction<I, O> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<I, O> AsyncAction<I, O> {
    pub fn new(name: impl Into<String>, operation: impl Fn(I) -> Result<O> + Send + Sync + 'static) -> Self {
        Self {
            state: Arc::new(ActionState {
                name: name.into(),
                operation: Box::new(operation),
                running: AtomicBool::new(false),
                error: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn error(&self) -> Option<String> {
        self.state
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_error(&self) {
        *self.state.error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Replaces the retained error. For operations that finish but still
    /// have something to report.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        log::error!("ACTION ERROR: {}: {}", self.state.name, message);
        *self.state.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    /// Runs the operation on the calling thread. Returns `None` without
    /// running anything if another invocation is outstanding, or when the
    /// operation fails; the failure's message is kept in `error()`.
    pub fn run(&self, input: I) -> Option<O> {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("ACTION: {} already running, request dropped", self.state.name);
            return None;
        }
        let _guard = RunningGuard(&self.state.running);

        log::debug!("ACTION START: {}", self.state.name);
        match (self.state.operation)(input) {
            Ok(output) => {
                log::debug!("ACTION DONE: {}", self.state.name);
                Some(output)
            }
            Err(e) => {
                self.report_error(format!("{:#}", e));
                None
            }
        }
    }
}

impl<I: Send + 'static, O: Send + 'static> AsyncAction<I, O> {
    /// Runs the operation on a new thread.
    pub fn spawn(&self, input: I) -> JoinHandle<Option<O>> {
        let action = self.clone();
        std::thread::spawn(move || action.run(input))
    }
}
