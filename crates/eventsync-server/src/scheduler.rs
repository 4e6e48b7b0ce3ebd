//! Periodic pull cycles.
//!
//! [`PullScheduler`] runs [`Synchronizer::pull`] on an interval with jitter,
//! backs off exponentially while pulls keep failing, and accepts commands
//! through a [`SchedulerHandle`]. Cycles never overlap: the next one is only
//! scheduled once the previous one has returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::config::exponential_backoff;
use crate::sync::{SyncReport, Synchronizer};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between pulls.
    pub pull_interval: Duration,
    /// Maximum jitter to add to the interval (as fraction 0.0-1.0).
    pub jitter_fraction: f64,
    /// Initial backoff duration on error.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pull_interval: Duration::from_secs(900),
            jitter_fraction: 0.1,
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(900),
            backoff_multiplier: 2.0,
        }
    }
}

impl SchedulerConfig {
    pub fn new(pull_interval: Duration) -> Self {
        Self {
            pull_interval,
            ..Default::default()
        }
    }

    /// Builder: set jitter fraction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Next regular delay, with jitter.
    pub fn next_pull_delay(&self) -> Duration {
        let base = self.pull_interval.as_secs_f64();
        let jitter = rand_jitter(base * self.jitter_fraction);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }

    /// Delay after `consecutive_failures` failed pulls.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        exponential_backoff(
            self.initial_backoff,
            self.max_backoff,
            self.backoff_multiplier,
            consecutive_failures,
        )
    }
}

/// Value in [-range, range] derived from the clock's sub-second part.
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let fraction = (nanos as f64) / 1_000_000_000.0;
    (fraction * 2.0 - 1.0) * range
}

/// Commands accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Pull immediately, even while paused.
    SyncNow,
    Pause,
    Resume,
    Stop,
}

/// What the scheduler has done so far.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub paused: bool,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<SyncReport>,
}

impl SchedulerState {
    fn record_success(&mut self, report: SyncReport) {
        self.consecutive_failures = 0;
        self.last_success = Some(Utc::now());
        self.last_attempt = self.last_success;
        self.last_error = None;
        self.last_report = Some(report);
    }

    fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures += 1;
        self.last_attempt = Some(Utc::now());
        self.last_error = Some(error.into());
    }
}

pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Drives pull cycles on a schedule.
pub struct PullScheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: Option<mpsc::Receiver<SchedulerCommand>>,
}

impl PullScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: Arc::new(RwLock::new(SchedulerState::default())),
            command_tx,
            command_rx: Some(command_rx),
        }
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Pulls once now, then on schedule until stopped.
    pub async fn run(mut self, synchronizer: Arc<Synchronizer>) {
        let Some(mut command_rx) = self.command_rx.take() else {
            return;
        };

        info!(
            interval_secs = self.config.pull_interval.as_secs(),
            "pull scheduler started"
        );

        self.pull(&synchronizer).await;

        loop {
            let delay = self.next_delay().await;
            debug!(delay_secs = delay.as_secs(), "scheduling next pull");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if self.state.read().await.paused {
                        debug!("scheduler paused, skipping pull");
                        continue;
                    }
                    self.pull(&synchronizer).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::SyncNow) => {
                            debug!("received SyncNow command");
                            self.pull(&synchronizer).await;
                        }
                        Some(SchedulerCommand::Pause) => {
                            info!("scheduler paused");
                            self.state.write().await.paused = true;
                        }
                        Some(SchedulerCommand::Resume) => {
                            info!("scheduler resumed");
                            self.state.write().await.paused = false;
                        }
                        Some(SchedulerCommand::Stop) | None => {
                            info!("scheduler stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn next_delay(&self) -> Duration {
        let failures = self.state.read().await.consecutive_failures;
        if failures > 0 {
            let backoff = self.config.backoff_delay(failures);
            debug!(failures, backoff_secs = backoff.as_secs(), "using backoff delay");
            return backoff;
        }
        self.config.next_pull_delay()
    }

    async fn pull(&self, synchronizer: &Synchronizer) {
        match synchronizer.pull().await {
            Ok(report) => self.state.write().await.record_success(report),
            Err(e) => {
                warn!(error = %e, "pull failed");
                self.state.write().await.record_failure(e.to_string());
            }
        }
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

impl SchedulerHandle {
    pub async fn sync_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::SyncNow).await
    }

    pub async fn pause(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Resume).await
    }

    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }

    /// Snapshot of the scheduler state.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventsync_providers::{
        BoxFuture, CalendarService, EventPayload, EventTransformer, OutboundEvent, ProviderError,
        ProviderResult,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::store::MemoryStore;

    /// Fails the first `fail_first` listings, then returns nothing.
    struct CountingCalendar {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl CalendarService for CountingCalendar {
        fn name(&self) -> &str {
            "counting"
        }

        fn list_events<'a>(
            &'a self,
            _calendar_id: &'a str,
        ) -> BoxFuture<'a, ProviderResult<Vec<EventPayload>>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = n < self.fail_first;
            Box::pin(async move {
                if fail {
                    Err(ProviderError::network(format!("failure {}", n)))
                } else {
                    Ok(Vec::new())
                }
            })
        }

        fn upsert_event<'a>(
            &'a self,
            outbound: &'a OutboundEvent,
        ) -> BoxFuture<'a, ProviderResult<EventPayload>> {
            let event = outbound.event.clone();
            Box::pin(async move { Ok(event) })
        }
    }

    fn synchronizer(fail_first: u32) -> (Arc<CountingCalendar>, Arc<Synchronizer>) {
        let calendar = Arc::new(CountingCalendar {
            calls: AtomicU32::new(0),
            fail_first,
        });
        let sync = Synchronizer::new(
            calendar.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(EventTransformer::new("primary", chrono_tz::Tz::UTC)),
        );
        (calendar, Arc::new(sync))
    }

    #[test]
    fn next_pull_delay_stays_within_jitter() {
        let config = SchedulerConfig::new(Duration::from_secs(60)).with_jitter(0.1);
        let delay = config.next_pull_delay();
        assert!(delay.as_secs_f64() >= 54.0);
        assert!(delay.as_secs_f64() <= 66.0);
    }

    #[test]
    fn backoff_delay_grows_and_caps() {
        let config = SchedulerConfig::default().with_backoff(
            Duration::from_secs(5),
            Duration::from_secs(300),
            2.0,
        );
        assert_eq!(config.backoff_delay(0), Duration::ZERO);
        assert_eq!(config.backoff_delay(1), Duration::from_secs(5));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(20));
        assert_eq!(config.backoff_delay(10), Duration::from_secs(300));
    }

    #[test]
    fn pull_and_push_backoff_share_one_schedule() {
        let (initial, max) = (Duration::from_secs(3), Duration::from_secs(60));
        let scheduler = SchedulerConfig::default().with_backoff(initial, max, 3.0);
        let retry = crate::config::RetryPolicy::default().with_backoff(initial, max, 3.0);
        for failures in 0..8 {
            assert_eq!(scheduler.backoff_delay(failures), retry.backoff_delay(failures));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn commands_drive_the_scheduler() {
        let (calendar, sync) = synchronizer(0);
        let scheduler = PullScheduler::new(SchedulerConfig::new(Duration::from_secs(3600)));
        let handle = scheduler.handle();
        let task = tokio::spawn(scheduler.run(sync));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);

        handle.sync_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 2);

        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.state().await.paused);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let state = handle.state().await;
        assert!(!state.paused);
        assert_eq!(state.last_report, Some(SyncReport::default()));

        handle.stop().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_then_recover() {
        let (calendar, sync) = synchronizer(3);
        let config = SchedulerConfig::new(Duration::from_secs(3600)).with_backoff(
            Duration::from_millis(10),
            Duration::from_millis(100),
            2.0,
        );
        let scheduler = PullScheduler::new(config);
        let handle = scheduler.handle();
        let task = tokio::spawn(scheduler.run(sync));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 4);
        let state = handle.state().await;
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_error.is_none());
        assert!(state.last_success.is_some());

        handle.stop().await.unwrap();
        task.await.unwrap();
    }
}
