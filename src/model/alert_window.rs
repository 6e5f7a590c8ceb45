use anyhow::{Result, bail};
use chrono::{NaiveTime, Timelike};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// 08:30
pub const DEFAULT_ALERT_START_MINUTES: u32 = 8 * 60 + 30;
/// 16:30
pub const DEFAULT_ALERT_END_MINUTES: u32 = 16 * 60 + 30;

/// Minutes elapsed since midnight for a wall-clock time.
pub fn minutes_from_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

pub fn fixed_time_from_minutes(minutes: u32) -> Result<NaiveTime> {
    if minutes >= MINUTES_PER_DAY {
        bail!("{} minutes is past the end of the day", minutes);
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid time of day: {} minutes", minutes))
}

/// Daily window, in minutes from midnight, during which SMS alerts may be
/// sent. A window whose end is before its start wraps past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertWindow {
    pub start: u32,
    pub end: u32,
}

impl Default for AlertWindow {
    fn default() -> Self {
        Self {
            start: DEFAULT_ALERT_START_MINUTES,
            end: DEFAULT_ALERT_END_MINUTES,
        }
    }
}

impl AlertWindow {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start >= MINUTES_PER_DAY || end >= MINUTES_PER_DAY {
            bail!("Alert window {}..{} is outside of a day", start, end);
        }
        Ok(Self { start, end })
    }

    /// Reads the stored `[start, end]` pair. Anything else is treated as no
    /// window.
    pub fn from_range(range: &[u32]) -> Option<Self> {
        match range {
            [start, end] => Self::new(*start, *end).ok(),
            _ => None,
        }
    }

    pub fn to_range(&self) -> Vec<u32> {
        vec![self.start, self.end]
    }

    pub fn contains(&self, minute: u32) -> bool {
        let minute = minute % MINUTES_PER_DAY;
        if self.start <= self.end {
            (self.start..=self.end).contains(&minute)
        } else {
            minute >= self.start || minute <= self.end
        }
    }

    pub fn contains_time(&self, time: NaiveTime) -> bool {
        self.contains(minutes_from_midnight(time))
    }
}
