//! fastscale-autoscale — reactive scale-out control loop.
//!
//! One [`ServiceLoop`] per configured service, all started and stopped by a
//! [`Supervisor`]. Loops share no mutable state; a slow or failing external
//! call in one loop never holds up another.
//!
//! # State machine
//!
//! ```text
//!            tick: count <= threshold
//!            tick: probe failed
//!              ┌──────────┐
//!              ▼          │
//!         ┌─────────┐─────┘  tick: count > threshold
//!  ──────▶│ Running │──────────────────────────────┐
//!         └─────────┘    (scale-out transaction)   ▼
//!              ▲                            ┌───────────┐
//!              └────── grace period (180s) ─│ Suspended │
//!                       elapsed, restart    └───────────┘
//!                       ticker
//! ```
//!
//! Cancellation stops both states at their wait point. A tick already in
//! progress, including its orchestrator write, runs to completion first.
//!
//! # Scale-out transaction
//!
//! ```text
//! current = orchestrator.desired_count()        // abort on error
//! next    = 2 * max(current, min_desired_count)
//! orchestrator.set_desired_count(next)          // abort on error, no notify
//! notifier.notify(...)                          // errors logged only
//! ```
//!
//! The loop suspends after the transaction whatever its outcome.

pub mod scaleout;
pub mod service_loop;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod fakes;

pub use scaleout::{scale_out, ScaleDecision, ScaleOutcome, ORCHESTRATOR_CALL_TIMEOUT};
pub use service_loop::{LoopState, ServiceLoop, TickOutcome, TimerPhase, SCALE_OUT_GRACE_PERIOD};
pub use supervisor::{LoopReport, Supervisor};
