//! Reachability probe abstraction layer.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use nettray_types::{probe::ProbeResult, NetTrayError};
use tokio::time::sleep;
use tracing::debug;

mod network;

pub use network::NetworkProbe;

/// One reachability check against a host.
///
/// Implementations absorb every network fault: a failed check is a
/// `ProbeResult` with `success == false`, never an error.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, target: &str) -> ProbeResult;
}

#[async_trait]
impl<P: Probe + ?Sized> Probe for Arc<P> {
    async fn check(&self, target: &str) -> ProbeResult {
        (**self).check(target).await
    }
}

/// Canned outcome replayed by [`ScriptedProbe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Reachable(Option<Duration>),
    Unreachable,
}

impl ScriptedOutcome {
    pub fn online_ms(ms: u64) -> Self {
        ScriptedOutcome::Reachable(Some(Duration::from_millis(ms)))
    }
}

/// Probe that replays a fixed script of outcomes, cycling when exhausted.
pub struct ScriptedProbe {
    script: Vec<ScriptedOutcome>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(script: Vec<ScriptedOutcome>) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Makes every check take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self, target: &str) -> ProbeResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        let outcome = if self.script.is_empty() {
            ScriptedOutcome::Unreachable
        } else {
            self.script[call % self.script.len()]
        };
        debug!("Scripted probe #{} against {}: {:?}", call, target, outcome);
        match outcome {
            ScriptedOutcome::Reachable(latency) => ProbeResult::reachable(Utc::now(), latency),
            ScriptedOutcome::Unreachable => ProbeResult::unreachable(Utc::now()),
        }
    }
}

/// Generate an error aligned with probe semantics.
pub fn probe_error(message: impl Into<String>) -> NetTrayError {
    NetTrayError::Probe(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_probe_cycles_through_outcomes() {
        let probe = ScriptedProbe::new(vec![
            ScriptedOutcome::online_ms(40),
            ScriptedOutcome::Unreachable,
        ]);

        let first = probe.check("example.org").await;
        assert!(first.success());
        assert_eq!(first.latency(), Some(Duration::from_millis(40)));

        let second = probe.check("example.org").await;
        assert!(!second.success());
        assert_eq!(second.latency(), None);

        let third = probe.check("example.org").await;
        assert!(third.success());
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn empty_script_reports_unreachable() {
        let probe = ScriptedProbe::new(Vec::new());
        assert!(!probe.check("example.org").await.success());
    }

    #[tokio::test]
    async fn shared_probe_delegates() {
        let probe = Arc::new(ScriptedProbe::new(vec![ScriptedOutcome::Reachable(None)]));
        let result = Probe::check(&probe, "example.org").await;
        assert!(result.success());
        assert_eq!(probe.calls(), 1);
    }
}
