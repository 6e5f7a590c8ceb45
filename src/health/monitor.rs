use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    model::HealthSignal,
    store::{ArcStore, DocPath, DocumentStore, DocumentSubscription, DocumentStoreExt},
};

use super::{HealthEvaluator, HealthStatus, RestartControl};

/// Follows the health document: evaluates every snapshot and drives the
/// restart control.
pub struct HealthMonitor {
    store: ArcStore,
    path: DocPath,
    subscription: DocumentSubscription,
    evaluator: HealthEvaluator,
    control: RestartControl,
}

impl HealthMonitor {
    pub fn open(store: ArcStore, path: DocPath, stale_after: TimeDelta, cooldown: TimeDelta) -> Result<Self> {
        let subscription = store
            .subscribe_document(&path)
            .with_context(|| format!("Failed to subscribe to {}", path))?;
        Ok(Self {
            store,
            path,
            subscription,
            evaluator: HealthEvaluator::new(stale_after),
            control: RestartControl::new(cooldown),
        })
    }

    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Evaluates every snapshot received since the last call at `now`.
    pub fn pump(&mut self, now: DateTime<Utc>) -> HealthStatus {
        for snapshot in self.subscription.drain() {
            let signal = match snapshot.decode::<HealthSignal>() {
                Ok(signal) => signal.unwrap_or_default(),
                Err(e) => {
                    log::error!("HEALTH: undecodable snapshot at {}: {:#}", snapshot.path, e);
                    continue;
                }
            };
            self.evaluator.observe(&signal, now);
            self.control.observe(&signal);
        }
        self.evaluator.status()
    }

    pub fn status(&self) -> HealthStatus {
        self.evaluator.status()
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.evaluator.last_accepted()
    }

    pub fn restart_enabled(&self, now: DateTime<Utc>) -> bool {
        self.control.is_enabled(now)
    }

    /// Asks the backend to restart. Returns `false` when the control is
    /// still disabled. A failed write re-enables the control.
    pub fn request_restart(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let Some(signal) = self.control.request(now) else {
            return Ok(false);
        };
        if let Err(e) = self.write_request(&signal) {
            self.control.abort();
            return Err(e.context("Failed to request restart"));
        }
        Ok(true)
    }

    /// Updates `heartbeat` and `reset` in place. Other fields the backend
    /// keeps in the document are left alone.
    fn write_request(&self, signal: &HealthSignal) -> Result<()> {
        if self.store.get_document(&self.path)?.is_none() {
            return self.store.set_as(&self.path, signal);
        }
        if let Some(heartbeat) = signal.heartbeat {
            self.store.apply(HealthSignal::heartbeat().update(&self.path, &heartbeat)?)?;
        }
        self.store.apply(HealthSignal::reset().update(&self.path, &signal.reset)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::{
        health::{DEFAULT_RESTART_COOLDOWN, DEFAULT_STALE_AFTER},
        store::{InMemoryStore, SlowStore},
    };

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    fn health_path() -> DocPath {
        DocPath::new("admin", "health_monitor")
    }

    #[test]
    fn missing_document_is_offline() -> Result<()> {
        let store = ArcStore::new(InMemoryStore::new());
        let mut monitor = HealthMonitor::open(store, health_path(), DEFAULT_STALE_AFTER, DEFAULT_RESTART_COOLDOWN)?;
        assert_eq!(monitor.pump(at(0)), HealthStatus::Offline);
        assert_eq!(monitor.last_heartbeat(), None);
        Ok(())
    }

    #[test]
    fn second_fresh_heartbeat_goes_online() -> Result<()> {
        let store = ArcStore::new(InMemoryStore::new());
        store.set_as(&health_path(), &HealthSignal::new(at(0)))?;
        let mut monitor =
            HealthMonitor::open(store.clone(), health_path(), DEFAULT_STALE_AFTER, DEFAULT_RESTART_COOLDOWN)?;
        assert_eq!(monitor.pump(at(0)), HealthStatus::Offline);

        store.set_as(&health_path(), &HealthSignal::new(at(600)))?;
        assert_eq!(monitor.pump(at(600)), HealthStatus::Online);
        Ok(())
    }

    #[test]
    fn restart_request_is_written_and_acknowledged() -> Result<()> {
        let store = ArcStore::new(InMemoryStore::new());
        store.set_as(&health_path(), &HealthSignal::new(at(0)))?;
        let mut monitor =
            HealthMonitor::open(store.clone(), health_path(), DEFAULT_STALE_AFTER, DEFAULT_RESTART_COOLDOWN)?;
        monitor.pump(at(0));

        assert!(monitor.request_restart(at(1))?);
        let written: HealthSignal = store.get_as(&health_path())?.unwrap();
        assert!(written.reset);
        assert!(!monitor.request_restart(at(2))?);

        monitor.pump(at(2));
        store.set_as(&health_path(), &HealthSignal::new(at(6)))?;
        monitor.pump(at(6));
        assert!(monitor.restart_enabled(at(6)));
        Ok(())
    }

    #[test]
    fn restart_request_keeps_backend_fields() -> Result<()> {
        let store = ArcStore::new(InMemoryStore::new());
        store.set_document(
            &health_path(),
            json!({ "heartbeat": "2024-03-01T12:00:00Z", "reset": false, "ping": "2024-03-01T11:59:00Z" }),
        )?;
        let mut monitor =
            HealthMonitor::open(store.clone(), health_path(), DEFAULT_STALE_AFTER, DEFAULT_RESTART_COOLDOWN)?;
        monitor.pump(at(0));

        assert!(monitor.request_restart(at(1))?);
        let doc = store.get_document(&health_path())?.unwrap();
        assert_eq!(doc["ping"], "2024-03-01T11:59:00Z");
        assert_eq!(doc["reset"], true);
        let written: HealthSignal = store.get_as(&health_path())?.unwrap();
        assert_eq!(written.heartbeat, Some(HealthSignal::restart_sentinel()));

        assert_eq!(monitor.pump(at(2)), HealthStatus::Offline);
        assert!(!monitor.restart_enabled(at(2)));
        Ok(())
    }

    #[test]
    fn failed_restart_write_reenables_control() -> Result<()> {
        let slow = SlowStore::new(ArcStore::new(InMemoryStore::new()), 0, 0);
        slow.set_fail_writes(true);
        let mut monitor = HealthMonitor::open(
            ArcStore::new(slow),
            health_path(),
            DEFAULT_STALE_AFTER,
            DEFAULT_RESTART_COOLDOWN,
        )?;
        assert!(monitor.request_restart(at(0)).is_err());
        assert!(monitor.restart_enabled(at(0)));
        Ok(())
    }
}
