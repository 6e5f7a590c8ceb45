use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Field, FieldPath};

/// Liveness document written by the monitored backend. The backend bumps
/// `heartbeat` and clears `reset` once it has restarted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSignal {
    #[serde(default)]
    pub heartbeat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reset: bool,
}

impl HealthSignal {
    pub fn new(heartbeat: DateTime<Utc>) -> Self {
        Self {
            heartbeat: Some(heartbeat),
            reset: false,
        }
    }

    pub fn heartbeat() -> Field<HealthSignal, DateTime<Utc>> {
        Field::new(FieldPath::from_dotted("heartbeat"))
    }

    pub fn reset() -> Field<HealthSignal, bool> {
        Field::new(FieldPath::from_dotted("reset"))
    }

    /// Heartbeat written with a restart request. Far enough in the past that
    /// the next evaluation reports the backend offline.
    pub fn restart_sentinel() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 2, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
