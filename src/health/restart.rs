use chrono::{DateTime, TimeDelta, Utc};

use crate::model::HealthSignal;

pub const DEFAULT_RESTART_COOLDOWN: TimeDelta = TimeDelta::seconds(20);

/// Operator restart button.
///
/// A request disables the control until the cool-down passes or the backend
/// acknowledges by clearing `reset`, whichever happens first. Only a clear
/// that follows a `reset = true` seen after the request counts, so the
/// snapshot preceding our own write cannot re-enable the control.
#[derive(Clone, Debug)]
pub struct RestartControl {
    cooldown: TimeDelta,
    disabled_until: Option<DateTime<Utc>>,
    saw_reset: bool,
}

impl Default for RestartControl {
    fn default() -> Self {
        Self::new(DEFAULT_RESTART_COOLDOWN)
    }
}

impl RestartControl {
    pub fn new(cooldown: TimeDelta) -> Self {
        Self {
            cooldown,
            disabled_until: None,
            saw_reset: false,
        }
    }

    pub fn is_enabled(&self, now: DateTime<Utc>) -> bool {
        self.disabled_until.map_or(true, |until| now >= until)
    }

    /// Returns the document to write, or `None` while the control is
    /// disabled.
    pub fn request(&mut self, now: DateTime<Utc>) -> Option<HealthSignal> {
        if !self.is_enabled(now) {
            log::debug!("RESTART: request ignored, control disabled");
            return None;
        }
        log::info!("RESTART: requested at {}", now);
        self.disabled_until = Some(now + self.cooldown);
        self.saw_reset = false;
        Some(HealthSignal {
            heartbeat: Some(HealthSignal::restart_sentinel()),
            reset: true,
        })
    }

    /// Re-enables the control immediately, e.g. after the request failed to
    /// be written.
    pub fn abort(&mut self) {
        self.disabled_until = None;
        self.saw_reset = false;
    }

    pub fn observe(&mut self, signal: &HealthSignal) {
        if self.disabled_until.is_none() {
            return;
        }
        if signal.reset {
            self.saw_reset = true;
        } else if self.saw_reset {
            log::info!("RESTART: acknowledged by backend");
            self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    fn cleared() -> HealthSignal {
        HealthSignal::new(at(0))
    }

    #[test]
    fn request_writes_reset_and_sentinel() {
        let mut control = RestartControl::default();
        let signal = control.request(at(0)).unwrap();
        assert!(signal.reset);
        assert_eq!(signal.heartbeat, Some(HealthSignal::restart_sentinel()));
        assert!(!control.is_enabled(at(0)));
    }

    #[test]
    fn reenables_after_cooldown() {
        let mut control = RestartControl::default();
        control.request(at(0));
        assert!(!control.is_enabled(at(19)));
        assert!(control.request(at(19)).is_none());
        assert!(control.is_enabled(at(20)));
        assert!(control.request(at(20)).is_some());
    }

    #[test]
    fn acknowledgment_reenables_early() {
        let mut control = RestartControl::default();
        let written = control.request(at(0)).unwrap();
        control.observe(&written);
        assert!(!control.is_enabled(at(4)));

        control.observe(&cleared());
        assert!(control.is_enabled(at(5)));
    }

    #[test]
    fn clear_without_prior_reset_does_not_count() {
        let mut control = RestartControl::default();
        control.request(at(0));
        control.observe(&cleared());
        assert!(!control.is_enabled(at(1)));
    }

    #[test]
    fn abort_reenables() {
        let mut control = RestartControl::new(TimeDelta::seconds(60));
        control.request(at(0));
        control.abort();
        assert!(control.is_enabled(at(1)));
    }
}
