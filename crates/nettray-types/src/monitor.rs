use serde::{Deserialize, Serialize};

/// Lifecycle of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl Default for MonitorState {
    fn default() -> Self {
        MonitorState::Idle
    }
}

/// How a call to `stop` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The loop exited within the shutdown grace period.
    Clean,
    /// The loop had to be abandoned after the grace period.
    TimedOut,
    /// Nothing was running.
    AlreadyStopped,
}

impl StopOutcome {
    pub fn is_timeout(self) -> bool {
        matches!(self, StopOutcome::TimedOut)
    }
}
