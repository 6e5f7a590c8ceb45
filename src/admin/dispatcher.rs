use anyhow::Result;

use crate::{
    action::AsyncAction,
    store::{ArcStore, DocumentStore, Mutation},
};

/// One entry of a closed set of list actions. `Scope` is whatever the
/// action needs besides the key to address its document, e.g. the
/// collection or the owning client document.
pub trait KeyedAction: Send + 'static {
    type Scope: Send + Sync + 'static;

    fn mutation(&self, scope: &Self::Scope, key: &str) -> Result<Mutation>;

    fn label(&self) -> &'static str;
}

/// Outcome of a batch. Keys are reported in the order they were given.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub applied: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let details: Vec<String> = self
            .failed
            .iter()
            .map(|(key, message)| format!("{}: {}", key, message))
            .collect();
        format!(
            "{} of {} failed ({})",
            self.failed.len(),
            self.failed.len() + self.applied.len(),
            details.join("; ")
        )
    }
}

/// Applies list actions to keys, one mutation per key. A batch is not
/// atomic: keys after a failure are still attempted and applied keys stay
/// applied. Failures surface through the dispatcher's error.
pub struct Dispatcher<A: KeyedAction> {
    action: AsyncAction<(A, Vec<String>), BatchReport>,
}

impl<A: KeyedAction> Dispatcher<A> {
    pub fn new(store: ArcStore, scope: A::Scope) -> Self {
        let action = AsyncAction::new("dispatch", move |(action, keys): (A, Vec<String>)| {
            let mut report = BatchReport::default();
            for key in keys {
                let result = action
                    .mutation(&scope, &key)
                    .and_then(|mutation| store.apply(mutation));
                match result {
                    Ok(()) => {
                        log::debug!("DISPATCH: {} '{}'", action.label(), key);
                        report.applied.push(key);
                    }
                    Err(e) => {
                        log::warn!("DISPATCH FAILED: {} '{}': {:#}", action.label(), key, e);
                        report.failed.push((key, format!("{:#}", e)));
                    }
                }
            }
            Ok(report)
        });
        Self { action }
    }

    pub fn dispatch(&self, action: A, key: &str) -> Option<BatchReport> {
        self.dispatch_batch(action, [key])
    }

    /// Returns `None` if a batch is already running.
    pub fn dispatch_batch<I, K>(&self, action: A, keys: I) -> Option<BatchReport>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let report = self.action.run((action, keys))?;
        if !report.is_complete() {
            self.action.report_error(report.summary());
        }
        Some(report)
    }

    pub fn running(&self) -> bool {
        self.action.running()
    }

    pub fn error(&self) -> Option<String> {
        self.action.error()
    }

    pub fn clear_error(&self) {
        self.action.clear_error()
    }
}
