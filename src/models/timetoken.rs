//! Timetokens: 100 ns ticks since the Unix epoch.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Ticks per microsecond.
const TICKS_PER_MICRO: u64 = 10;

/// High-resolution identifier ordering messages and reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timetoken(pub u64);

impl Timetoken {
    /// Timetoken for the current wall-clock instant.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self((nanos / 100) as u64)
    }

    /// Convert to a UTC date-time. Out-of-range values clamp to the epoch.
    pub fn to_datetime(self) -> DateTime<Utc> {
        let micros = (self.0 / TICKS_PER_MICRO) as i64;
        DateTime::from_timestamp_micros(micros).unwrap_or_default()
    }

    /// Short local time ("14:05") for message headers.
    pub fn short_time(self) -> String {
        self.to_datetime()
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }
}

impl fmt::Display for Timetoken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timetoken {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
