use chrono::{DateTime, TimeDelta, Utc};

use crate::model::HealthSignal;

/// 70 minutes
pub const DEFAULT_STALE_AFTER: TimeDelta = TimeDelta::seconds(70 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Online,
    Offline,
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Online => "Online",
            HealthStatus::Offline => "Offline",
        }
    }
}

/// Classifies the monitored backend from successive heartbeats.
///
/// A snapshot reports Online when the previously accepted heartbeat is no
/// older than `stale_after` at the time the snapshot is evaluated. The
/// snapshot's own heartbeat then becomes the accepted one, so a single
/// heartbeat never reports Online on its own. A snapshot without a
/// heartbeat reports Offline and leaves the accepted heartbeat alone.
#[derive(Clone, Debug)]
pub struct HealthEvaluator {
    stale_after: TimeDelta,
    last_accepted: Option<DateTime<Utc>>,
    status: HealthStatus,
}

impl Default for HealthEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

impl HealthEvaluator {
    pub fn new(stale_after: TimeDelta) -> Self {
        Self {
            stale_after,
            last_accepted: None,
            status: HealthStatus::Offline,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn last_accepted(&self) -> Option<DateTime<Utc>> {
        self.last_accepted
    }

    pub fn stale_after(&self) -> TimeDelta {
        self.stale_after
    }

    pub fn observe(&mut self, signal: &HealthSignal, now: DateTime<Utc>) -> HealthStatus {
        let Some(heartbeat) = signal.heartbeat else {
            self.status = HealthStatus::Offline;
            return self.status;
        };

        let fresh = self
            .last_accepted
            .is_some_and(|previous| now.signed_duration_since(previous) <= self.stale_after);
        let status = if fresh { HealthStatus::Online } else { HealthStatus::Offline };
        if status != self.status {
            log::info!("HEALTH: {} -> {} (heartbeat {})", self.status.label(), status.label(), heartbeat);
        }
        self.status = status;
        self.last_accepted = Some(heartbeat);
        status
    }
}
