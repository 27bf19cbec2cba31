use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one reachability check.
///
/// A latency is only ever attached to a successful result. The two
/// constructors enforce that, and deserialization rejects records that
/// break it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProbeRecord")]
pub struct ProbeResult {
    timestamp: DateTime<Utc>,
    success: bool,
    latency: Option<Duration>,
}

impl ProbeResult {
    pub fn reachable(timestamp: DateTime<Utc>, latency: Option<Duration>) -> Self {
        Self {
            timestamp,
            success: true,
            latency,
        }
    }

    pub fn unreachable(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            success: false,
            latency: None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Latency in fractional milliseconds, the unit every display uses.
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency.map(duration_ms)
    }
}

#[derive(Deserialize)]
struct ProbeRecord {
    timestamp: DateTime<Utc>,
    success: bool,
    latency: Option<Duration>,
}

impl TryFrom<ProbeRecord> for ProbeResult {
    type Error = String;

    fn try_from(record: ProbeRecord) -> Result<Self, Self::Error> {
        match (record.success, record.latency) {
            (true, latency) => Ok(Self::reachable(record.timestamp, latency)),
            (false, None) => Ok(Self::unreachable(record.timestamp)),
            (false, Some(_)) => Err("an unreachable result cannot carry a latency".into()),
        }
    }
}

pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}
