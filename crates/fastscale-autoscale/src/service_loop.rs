//! Per-service control loop.
//!
//! A `ServiceLoop` ticks at the service's check interval, probes the status
//! page on every tick, and runs a scale-out when the observed connection
//! count goes above the threshold. After a scale-out attempt the ticker is
//! stopped for [`SCALE_OUT_GRACE_PERIOD`] and then restarted.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use fastscale_core::{ServiceSpec, DEFAULT_CHECK_INTERVAL_SECS, MAX_CHECK_INTERVAL_SECS};
use fastscale_ecs::Orchestrator;
use fastscale_notify::Notifier;
use fastscale_probe::{ProbeError, StatusProbe};

use crate::scaleout::{scale_out, ScaleOutcome, ORCHESTRATOR_CALL_TIMEOUT};

/// How long probing stops after a scale-out attempt.
pub const SCALE_OUT_GRACE_PERIOD: Duration = Duration::from_secs(180);

/// Timer phase of a service loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    /// Ticking at the check interval.
    Running,
    /// Ticker stopped for `period`, then restarted.
    Suspended { period: Duration },
    /// Shut down. No further ticks.
    Stopped,
}

/// Mutable state of one loop. Never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopState {
    pub phase: TimerPhase,
    /// Ticks evaluated so far.
    pub ticks: u64,
    /// Ticks whose probe failed.
    pub probe_failures: u64,
    /// Scale-out transactions attempted.
    pub scale_outs: u64,
}

impl LoopState {
    fn new() -> Self {
        Self {
            phase: TimerPhase::Running,
            ticks: 0,
            probe_failures: 0,
            scale_outs: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    fn suspend(&mut self, period: Duration) {
        self.phase = TimerPhase::Suspended { period };
    }

    fn resume(&mut self) {
        self.phase = TimerPhase::Running;
    }
}

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// No count this tick; state unchanged.
    ProbeFailed(ProbeError),
    /// Count at or below the threshold; state unchanged.
    BelowThreshold { count: u64 },
    /// Count above the threshold; a scale-out was attempted and the loop is
    /// now suspended.
    ScaledOut { count: u64, outcome: ScaleOutcome },
}

/// The control loop for a single service.
pub struct ServiceLoop {
    spec: ServiceSpec,
    probe: Arc<dyn StatusProbe>,
    orchestrator: Arc<dyn Orchestrator>,
    notifier: Arc<dyn Notifier>,
    call_timeout: Duration,
    state: LoopState,
}

impl ServiceLoop {
    pub fn new(
        spec: ServiceSpec,
        probe: Arc<dyn StatusProbe>,
        orchestrator: Arc<dyn Orchestrator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            spec,
            probe,
            orchestrator,
            notifier,
            call_timeout: ORCHESTRATOR_CALL_TIMEOUT,
            state: LoopState::new(),
        }
    }

    /// Override the per-call orchestrator timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Evaluate one tick of the `Running` state.
    ///
    /// Probe errors leave the state untouched. A count strictly above the
    /// threshold runs the scale-out transaction and moves the loop to
    /// `Suspended`, whether or not the transaction succeeded.
    pub async fn tick(&mut self) -> TickOutcome {
        self.state.ticks += 1;

        let count = match self.probe.fetch(&self.spec).await {
            Ok(count) => count,
            Err(e) => {
                self.state.probe_failures += 1;
                warn!(error = %e, "probe failed");
                return TickOutcome::ProbeFailed(e);
            }
        };
        info!(count, "active connections");

        if count <= self.spec.scaleout_threshold {
            return TickOutcome::BelowThreshold { count };
        }

        info!(
            count,
            threshold = self.spec.scaleout_threshold,
            "threshold exceeded, scaling out"
        );
        self.state.scale_outs += 1;
        let outcome = scale_out(
            &self.spec,
            self.orchestrator.as_ref(),
            self.notifier.as_ref(),
            count,
            self.call_timeout,
        )
        .await;
        self.state.suspend(SCALE_OUT_GRACE_PERIOD);

        TickOutcome::ScaledOut { count, outcome }
    }

    /// Drive the loop until `cancel` fires. Returns the final state.
    ///
    /// Cancellation is observed while waiting for the next tick and while
    /// suspended. A tick in progress is never interrupted.
    pub async fn run(self, cancel: CancellationToken) -> LoopState {
        let span = info_span!(
            "service_loop",
            service = %self.spec.service,
            cluster = %self.spec.cluster,
        );
        self.run_inner(cancel).instrument(span).await
    }

    async fn run_inner(mut self, cancel: CancellationToken) -> LoopState {
        let period = tick_period(&self.spec);
        info!(
            interval_secs = period.as_secs_f64(),
            threshold = self.spec.scaleout_threshold,
            min_desired_count = self.spec.min_desired_count,
            "service loop started"
        );

        let mut ticker = start_ticker(period);
        loop {
            match self.state.phase {
                TimerPhase::Running => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            self.tick().await;
                        }
                    }
                }
                TimerPhase::Suspended { period: pause } => {
                    info!(secs = pause.as_secs(), "pause timer");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(pause) => {
                            self.state.resume();
                            ticker = start_ticker(period);
                            info!("resume timer");
                        }
                    }
                }
                TimerPhase::Stopped => break,
            }
        }

        self.state.phase = TimerPhase::Stopped;
        info!(
            ticks = self.state.ticks,
            probe_failures = self.state.probe_failures,
            scale_outs = self.state.scale_outs,
            "stop timer"
        );
        self.state
    }
}

/// Check interval, never zero and never longer than a day.
fn tick_period(spec: &ServiceSpec) -> Duration {
    let max = Duration::from_secs(MAX_CHECK_INTERVAL_SECS);
    if spec.check_interval.is_zero() {
        debug!("zero check interval, using default");
        Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS)
    } else if spec.check_interval > max {
        warn!(
            secs = spec.check_interval.as_secs(),
            max_secs = MAX_CHECK_INTERVAL_SECS,
            "check interval too long, clamped"
        );
        max
    } else {
        spec.check_interval
    }
}

/// A ticker whose first tick is one full period from now. Overrunning
/// ticks push the schedule back instead of bursting.
fn start_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
