use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::{duration_ms, ProbeResult};

/// Notification emitted after every probe, once its result is in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub online: bool,
    pub latency: Option<Duration>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency.map(duration_ms)
    }

    /// Short human readable status, in the style of a tray tooltip.
    pub fn summary(&self) -> String {
        match (self.online, self.latency_ms()) {
            (true, Some(ms)) => format!("reachable ({ms:.0} ms)"),
            (true, None) => "reachable".to_string(),
            (false, _) => "unreachable".to_string(),
        }
    }
}

impl From<&ProbeResult> for StatusEvent {
    fn from(result: &ProbeResult) -> Self {
        Self {
            online: result.success(),
            latency: result.latency(),
            timestamp: result.timestamp(),
        }
    }
}
