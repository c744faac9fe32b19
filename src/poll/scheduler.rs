//! Fixed-interval scheduler with failure escalation.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cycle::PollCycle;
use crate::config::SchedulerConfig;
use crate::{Result, TrackerError};

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Running cycles.
    Running,
    /// Cancellation observed; finishing up.
    ShuttingDown,
    /// Loop exited.
    Stopped,
}

/// Counts consecutive failed cycles and decides when to alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTracker {
    threshold: u32,
    consecutive: u32,
}

impl FailureTracker {
    /// Create a tracker that fires after `threshold` consecutive failures.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
        }
    }

    /// Current run of failures.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Clear the run after a successful cycle.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Count a failed cycle.
    ///
    /// Returns the failure count when the threshold is reached, and resets
    /// so a sustained outage alerts once per run of `threshold` failures.
    pub fn record_failure(&mut self) -> Option<u32> {
        self.consecutive += 1;
        if self.consecutive >= self.threshold {
            let count = self.consecutive;
            self.consecutive = 0;
            Some(count)
        } else {
            None
        }
    }
}

/// Totals reported when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    /// Cycles run.
    pub cycles: u64,
    /// Cycles that completed.
    pub successes: u64,
    /// Cycles that failed.
    pub failures: u64,
    /// Alerts dispatched.
    pub alerts_sent: u64,
    /// New articles across all cycles.
    pub new_articles: u64,
}

/// Runs poll cycles on a fixed interval until cancelled.
pub struct Scheduler {
    cycle: PollCycle,
    interval: Duration,
    failures: FailureTracker,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    /// Create a scheduler from configuration.
    pub fn new(cycle: PollCycle, config: &SchedulerConfig) -> Self {
        Self::with_interval(
            cycle,
            Duration::from_secs(config.poll_interval_secs),
            config.alert_threshold,
        )
    }

    /// Create a scheduler with an explicit interval and alert threshold.
    pub fn with_interval(cycle: PollCycle, interval: Duration, alert_threshold: u32) -> Self {
        let (state, _) = watch::channel(SchedulerState::Running);
        Self {
            cycle,
            interval,
            failures: FailureTracker::new(alert_threshold),
            state,
        }
    }

    /// Watch the scheduler state.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run one cycle, containing panics.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<usize> {
        match AssertUnwindSafe(self.cycle.run(cancel)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Poll cycle panicked: {}", message);
                Err(TrackerError::Fetch(format!("cycle panicked: {}", message)))
            }
        }
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> SchedulerSummary {
        let mut summary = SchedulerSummary::default();
        self.state.send_replace(SchedulerState::Running);
        info!(
            "Scheduler started (interval: {} seconds, alert after {} failures)",
            self.interval.as_secs(),
            self.failures.threshold
        );

        while !cancel.is_cancelled() {
            debug!("Poll cycle starting");
            summary.cycles += 1;

            match self.run_once(&cancel).await {
                Ok(count) => {
                    summary.successes += 1;
                    summary.new_articles += count as u64;
                    self.failures.record_success();
                    if count > 0 {
                        info!("{} new article(s)", count);
                    } else {
                        info!("No new articles");
                    }
                }
                Err(e) => {
                    summary.failures += 1;
                    if !e.is_cycle_failure() {
                        warn!("Poll cycle returned unexpected error kind: {}", e);
                    }
                    if let Some(count) = self.failures.record_failure() {
                        warn!("Poll failed ({}/{}): {}", count, self.failures.threshold, e);
                        let message = format!("{} (last error: {})", failure_summary(count), e);
                        let outcome = self.cycle.notifier().notify_alert(&message, count).await;
                        summary.alerts_sent += 1;
                        if !outcome.is_delivered() {
                            error!("Failure alert was not delivered");
                        }
                    } else {
                        warn!(
                            "Poll failed ({}/{}): {}",
                            self.failures.consecutive(),
                            self.failures.threshold,
                            e
                        );
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state.send_replace(SchedulerState::ShuttingDown);
        info!(
            "Scheduler stopping after {} cycle(s): {} ok, {} failed, {} alert(s)",
            summary.cycles, summary.successes, summary.failures, summary.alerts_sent
        );
        self.state.send_replace(SchedulerState::Stopped);
        summary
    }
}

fn failure_summary(count: u32) -> String {
    format!("Poll cycle failed {}x in a row.", count)
}
