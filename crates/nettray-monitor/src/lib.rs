//! Background connectivity monitor: polls a probe, keeps recent history and
//! fans status events out to subscribers.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use nettray_probe::Probe;
use nettray_types::{
    config::{MonitorConfig, ProbeConfig},
    events::StatusEvent,
    monitor::{MonitorState, StopOutcome},
    probe::ProbeResult,
    NetTrayError, Result,
};
use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, info, warn};

pub mod history;
pub mod registry;

pub use history::{HistoryBuffer, HISTORY_CAPACITY};
pub use registry::{StatusHandler, SubscriberRegistry, SubscriptionId};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub target: String,
    pub poll_interval: Duration,
    pub shutdown_grace: Duration,
}

impl MonitorSettings {
    pub fn from_config(probe: &ProbeConfig, monitor: &MonitorConfig) -> Self {
        Self {
            target: probe.target_host.clone(),
            poll_interval: Duration::from_millis(monitor.poll_interval_ms),
            shutdown_grace: Duration::from_millis(monitor.shutdown_grace_ms),
        }
    }
}

struct Shared<P> {
    probe: P,
    settings: MonitorSettings,
    history: HistoryBuffer,
    subscribers: SubscriberRegistry,
}

impl<P: Probe> Shared<P> {
    /// Probe once, record, then notify. Subscribers only ever see a result
    /// that is already in the history.
    async fn poll_once(&self) -> ProbeResult {
        let result = self.probe.check(&self.settings.target).await;
        debug!(
            "Probe {}: success={} latency={:?}",
            self.settings.target,
            result.success(),
            result.latency()
        );
        self.history.append(result.clone());
        self.subscribers.emit(&StatusEvent::from(&result));
        result
    }
}

struct LoopControl {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Lifecycle {
    state: MonitorState,
    control: Option<LoopControl>,
    // flips to true once an in-progress stop has finished
    stopped: Option<watch::Receiver<bool>>,
}

/// Owns the polling task for one target.
pub struct ConnectivityMonitor<P>
where
    P: Probe + 'static,
{
    shared: Arc<Shared<P>>,
    lifecycle: Mutex<Lifecycle>,
}

impl<P> ConnectivityMonitor<P>
where
    P: Probe + 'static,
{
    pub fn new(probe: P, settings: MonitorSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                probe,
                settings,
                history: HistoryBuffer::new(),
                subscribers: SubscriberRegistry::new(),
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn target(&self) -> &str {
        &self.shared.settings.target
    }

    pub fn state(&self) -> MonitorState {
        self.lock_lifecycle().state
    }

    /// Spawns the polling task on the current tokio runtime. Calling it
    /// while already running is a no-op.
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|err| monitor_error(format!("no tokio runtime to run on: {err}")))?;

        let mut lifecycle = self.lock_lifecycle();
        match lifecycle.state {
            MonitorState::Running => {
                debug!("Connectivity monitor already running");
                return Ok(());
            }
            MonitorState::Stopping => {
                return Err(monitor_error("monitor is still stopping"));
            }
            MonitorState::Idle | MonitorState::Stopped => {}
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = runtime.spawn(run_loop(Arc::clone(&self.shared), stop_rx));
        lifecycle.control = Some(LoopControl { stop_tx, handle });
        lifecycle.state = MonitorState::Running;
        Ok(())
    }

    /// Asks the loop to exit and waits for it at most `shutdown_grace`.
    ///
    /// An in-flight probe is allowed to finish inside that window; past it
    /// the task is aborted and [`StopOutcome::TimedOut`] is returned.
    /// A call that overlaps a stop already in progress waits for that one
    /// to finish and then returns [`StopOutcome::AlreadyStopped`].
    pub async fn stop(&self) -> StopOutcome {
        let claimed = {
            let mut lifecycle = self.lock_lifecycle();
            match lifecycle.control.take() {
                Some(control) => {
                    let (done_tx, done_rx) = watch::channel(false);
                    lifecycle.state = MonitorState::Stopping;
                    lifecycle.stopped = Some(done_rx);
                    Ok((control, done_tx))
                }
                None => match lifecycle.state {
                    MonitorState::Idle => {
                        lifecycle.state = MonitorState::Stopped;
                        Err(None)
                    }
                    MonitorState::Stopping => Err(lifecycle.stopped.clone()),
                    MonitorState::Running | MonitorState::Stopped => Err(None),
                },
            }
        };
        let (control, done_tx) = match claimed {
            Ok(claimed) => claimed,
            Err(pending) => {
                if let Some(done_rx) = pending {
                    wait_until_stopped(done_rx).await;
                }
                return StopOutcome::AlreadyStopped;
            }
        };

        info!("Stopping connectivity monitor for {}", self.target());
        let _ = control.stop_tx.send(true);
        let mut handle = control.handle;
        let grace = self.shared.settings.shutdown_grace;
        let outcome = match timeout(grace, &mut handle).await {
            Ok(_) => StopOutcome::Clean,
            Err(_) => {
                warn!(
                    "Monitor loop did not exit within {:?}; abandoning it",
                    grace
                );
                handle.abort();
                StopOutcome::TimedOut
            }
        };

        {
            let mut lifecycle = self.lock_lifecycle();
            lifecycle.state = MonitorState::Stopped;
            lifecycle.stopped = None;
        }
        let _ = done_tx.send(true);
        outcome
    }

    pub fn on_status_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscribers.unsubscribe(id)
    }

    pub fn history_snapshot(&self) -> Vec<ProbeResult> {
        self.shared.history.snapshot()
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Drop for ConnectivityMonitor<P>
where
    P: Probe + 'static,
{
    fn drop(&mut self) {
        if let Some(control) = self.lock_lifecycle().control.take() {
            let _ = control.stop_tx.send(true);
            control.handle.abort();
        }
    }
}

async fn run_loop<P: Probe>(shared: Arc<Shared<P>>, mut stop_rx: watch::Receiver<bool>) {
    let interval = shared.settings.poll_interval;
    info!(
        "Connectivity monitor running against {} every {:?}",
        shared.settings.target, interval
    );

    let mut last_online: Option<bool> = None;
    loop {
        let result = shared.poll_once().await;
        if last_online != Some(result.success()) {
            if result.success() {
                info!("{} is reachable", shared.settings.target);
            } else {
                warn!("{} is unreachable", shared.settings.target);
            }
            last_online = Some(result.success());
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = stop_rx.changed() => break,
        }
    }

    info!("Connectivity monitor loop exited");
}

async fn wait_until_stopped(mut done_rx: watch::Receiver<bool>) {
    while !*done_rx.borrow_and_update() {
        // sender gone means the first stop was cancelled mid-way
        if done_rx.changed().await.is_err() {
            break;
        }
    }
}

pub fn monitor_error(message: impl Into<String>) -> NetTrayError {
    NetTrayError::Monitor(message.into())
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use nettray_probe::{ScriptedOutcome, ScriptedProbe};
    use tokio::time::Instant;

    use super::*;

    fn settings(poll_ms: u64) -> MonitorSettings {
        MonitorSettings {
            target: "example.org".into(),
            poll_interval: Duration::from_millis(poll_ms),
            shutdown_grace: Duration::from_millis(1_000),
        }
    }

    fn scripted(script: Vec<ScriptedOutcome>) -> Arc<ScriptedProbe> {
        Arc::new(ScriptedProbe::new(script))
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_the_configured_interval() {
        let probe = scripted(vec![
            ScriptedOutcome::online_ms(40),
            ScriptedOutcome::Unreachable,
        ]);
        let monitor = ConnectivityMonitor::new(Arc::clone(&probe), settings(2_000));
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            monitor.on_status_changed(move |event| events.lock().unwrap().push(event.clone()));
        }

        monitor.start().expect("start");
        assert_eq!(monitor.state(), MonitorState::Running);
        sleep(Duration::from_millis(4_500)).await;

        let events = events.lock().unwrap().clone();
        assert_eq!(events.len(), 3);
        assert!(events[0].online);
        assert_eq!(events[0].latency, Some(Duration::from_millis(40)));
        assert!(!events[1].online);
        assert_eq!(events[1].latency, None);
        assert!(events[2].online);

        let history = monitor.history_snapshot();
        assert_eq!(history.len(), 3);
        assert!(!history[1].success());
        assert_eq!(monitor.stop().await, StopOutcome::Clean);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_inside_handler_ends_with_the_event() {
        let probe = scripted(vec![
            ScriptedOutcome::online_ms(10),
            ScriptedOutcome::online_ms(20),
            ScriptedOutcome::Unreachable,
        ]);
        let monitor = Arc::new(ConnectivityMonitor::new(probe, settings(100)));
        let mismatches = Arc::new(Mutex::new(0usize));
        let seen = Arc::new(Mutex::new(0usize));
        {
            let weak: Weak<ConnectivityMonitor<Arc<ScriptedProbe>>> = Arc::downgrade(&monitor);
            let mismatches = Arc::clone(&mismatches);
            let seen = Arc::clone(&seen);
            monitor.on_status_changed(move |event| {
                let Some(monitor) = weak.upgrade() else {
                    return;
                };
                *seen.lock().unwrap() += 1;
                let last = monitor.history_snapshot().last().cloned();
                let matches = last
                    .map(|r| r.success() == event.online && r.timestamp() == event.timestamp)
                    .unwrap_or(false);
                if !matches {
                    *mismatches.lock().unwrap() += 1;
                }
            });
        }

        monitor.start().expect("start");
        sleep(Duration::from_millis(1_050)).await;
        monitor.stop().await;

        assert!(*seen.lock().unwrap() >= 10);
        assert_eq!(*mismatches.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn history_is_capped_at_thirty_most_recent() {
        let probe = scripted(vec![ScriptedOutcome::online_ms(5)]);
        let monitor = ConnectivityMonitor::new(probe, settings(10));
        monitor.start().expect("start");
        sleep(Duration::from_millis(1_000)).await;
        monitor.stop().await;

        let history = monitor.history_snapshot();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!(history
            .windows(2)
            .all(|pair| pair[0].timestamp() <= pair[1].timestamp()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let monitor = ConnectivityMonitor::new(scripted(vec![]), settings(2_000));
        monitor.start().expect("start");
        sleep(Duration::from_millis(10)).await;

        assert_eq!(monitor.stop().await, StopOutcome::Clean);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(monitor.stop().await, StopOutcome::AlreadyStopped);
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_is_harmless() {
        let monitor = ConnectivityMonitor::new(scripted(vec![]), settings(2_000));
        assert_eq!(monitor.state(), MonitorState::Idle);
        assert_eq!(monitor.stop().await, StopOutcome::AlreadyStopped);
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_runs_a_single_loop() {
        let probe = scripted(vec![ScriptedOutcome::Unreachable]);
        let monitor = ConnectivityMonitor::new(Arc::clone(&probe), settings(2_000));
        monitor.start().expect("first start");
        monitor.start().expect("second start");
        sleep(Duration::from_millis(100)).await;

        assert_eq!(probe.calls(), 1);
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_the_poll_sleep() {
        let monitor = ConnectivityMonitor::new(scripted(vec![]), settings(60_000));
        monitor.start().expect("start");
        sleep(Duration::from_millis(10)).await;

        let started = Instant::now();
        assert_eq!(monitor.stop().await, StopOutcome::Clean);
        assert!(started.elapsed() < Duration::from_millis(60_000));
        assert!(started.elapsed() <= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_is_abandoned_after_grace_period() {
        let probe = Arc::new(
            ScriptedProbe::new(vec![ScriptedOutcome::Unreachable])
                .with_delay(Duration::from_secs(60)),
        );
        let monitor = ConnectivityMonitor::new(probe, settings(2_000));
        monitor.start().expect("start");
        sleep(Duration::from_millis(10)).await;

        let started = Instant::now();
        assert_eq!(monitor.stop().await, StopOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert!(monitor.history_snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_stop_waits_for_the_first() {
        let probe = Arc::new(
            ScriptedProbe::new(vec![ScriptedOutcome::Unreachable])
                .with_delay(Duration::from_secs(60)),
        );
        let monitor = ConnectivityMonitor::new(probe, settings(2_000));
        monitor.start().expect("start");
        sleep(Duration::from_millis(10)).await;

        let started = Instant::now();
        let (first, second) = tokio::join!(monitor.stop(), async {
            let outcome = monitor.stop().await;
            (outcome, monitor.state(), started.elapsed())
        });

        assert_eq!(first, StopOutcome::TimedOut);
        let (outcome, state, waited) = second;
        assert_eq!(outcome, StopOutcome::AlreadyStopped);
        assert_eq!(state, MonitorState::Stopped);
        assert!(waited >= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribed_handler_stops_receiving() {
        let monitor =
            ConnectivityMonitor::new(scripted(vec![ScriptedOutcome::Unreachable]), settings(100));
        let tray = Arc::new(Mutex::new(0usize));
        let popup = Arc::new(Mutex::new(0usize));
        let popup_id = {
            let popup = Arc::clone(&popup);
            monitor.on_status_changed(move |_| *popup.lock().unwrap() += 1)
        };
        {
            let tray = Arc::clone(&tray);
            monitor.on_status_changed(move |_| *tray.lock().unwrap() += 1);
        }

        monitor.start().expect("start");
        sleep(Duration::from_millis(250)).await;
        assert!(monitor.unsubscribe(popup_id));
        let popup_at_unsubscribe = *popup.lock().unwrap();
        sleep(Duration::from_millis(500)).await;
        monitor.stop().await;

        assert_eq!(*popup.lock().unwrap(), popup_at_unsubscribe);
        assert!(*tray.lock().unwrap() > popup_at_unsubscribe);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop() {
        let probe = scripted(vec![ScriptedOutcome::online_ms(12)]);
        let monitor = ConnectivityMonitor::new(Arc::clone(&probe), settings(2_000));
        monitor.start().expect("start");
        sleep(Duration::from_millis(10)).await;
        monitor.stop().await;
        monitor.start().expect("restart");
        assert_eq!(monitor.state(), MonitorState::Running);
        sleep(Duration::from_millis(10)).await;
        monitor.stop().await;
        assert_eq!(probe.calls(), 2);
        assert_eq!(monitor.history_snapshot().len(), 2);
    }

    #[test]
    fn start_without_runtime_fails() {
        let monitor = ConnectivityMonitor::new(scripted(vec![]), settings(2_000));
        let err = monitor.start().unwrap_err();
        assert!(matches!(err, NetTrayError::Monitor(_)));
        assert_eq!(monitor.state(), MonitorState::Idle);
    }
}
