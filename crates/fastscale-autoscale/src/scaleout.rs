//! Scale-out transaction: read, double, write, notify.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use fastscale_core::ServiceSpec;
use fastscale_ecs::{Orchestrator, OrchestratorError, OrchestratorOp, OrchestratorResult};
use fastscale_notify::{Notifier, ScaleOutEvent};

/// Upper bound on a single orchestrator call.
pub const ORCHESTRATOR_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// The numbers behind one scale-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleDecision {
    /// Connection count that triggered the scale-out.
    pub observed: u64,
    /// Desired count read from the orchestrator.
    pub current: i64,
    /// Desired count requested.
    pub next: i64,
}

impl ScaleDecision {
    pub fn new(spec: &ServiceSpec, observed: u64, current: i64) -> Self {
        Self {
            observed,
            current,
            next: spec.next_desired_count(current),
        }
    }
}

/// How a scale-out transaction ended.
#[derive(Debug)]
pub enum ScaleOutcome {
    /// The new desired count was written. `notified` is false when the
    /// webhook call failed.
    Applied {
        decision: ScaleDecision,
        notified: bool,
    },
    /// The current desired count could not be read; nothing was written.
    ReadFailed(OrchestratorError),
    /// The write was rejected; no notification was sent.
    WriteFailed {
        decision: ScaleDecision,
        error: OrchestratorError,
    },
}

impl ScaleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Run one scale-out transaction for `spec`.
///
/// Orchestrator failures end the transaction early and are reported in the
/// returned outcome. None of them are retried.
pub async fn scale_out(
    spec: &ServiceSpec,
    orchestrator: &dyn Orchestrator,
    notifier: &dyn Notifier,
    observed: u64,
    call_timeout: Duration,
) -> ScaleOutcome {
    let current = match bounded(
        OrchestratorOp::Read,
        call_timeout,
        orchestrator.desired_count(spec),
    )
    .await
    {
        Ok(current) => current,
        Err(e) => {
            warn!(code = e.code(), error = %e, "get desired count failed, scale-out aborted");
            return ScaleOutcome::ReadFailed(e);
        }
    };

    let decision = ScaleDecision::new(spec, observed, current);
    info!(
        current = decision.current,
        next = decision.next,
        min = spec.min_desired_count,
        "changing desired count"
    );

    if let Err(e) = bounded(
        OrchestratorOp::Write,
        call_timeout,
        orchestrator.set_desired_count(spec, decision.next),
    )
    .await
    {
        warn!(code = e.code(), error = %e, next = decision.next, "set desired count failed, scale-out aborted");
        return ScaleOutcome::WriteFailed { decision, error: e };
    }

    let event = ScaleOutEvent {
        service: &spec.service,
        active_connections: decision.observed,
        current_count: decision.current,
        new_count: decision.next,
    };
    let notified = match notifier.notify(spec.webhook_url.as_deref(), event).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "scale-out notification failed");
            false
        }
    };

    ScaleOutcome::Applied { decision, notified }
}

/// Run an orchestrator call with a deadline, folding expiry into the
/// call's own error type.
async fn bounded<T>(
    op: OrchestratorOp,
    timeout: Duration,
    call: impl Future<Output = OrchestratorResult<T>>,
) -> OrchestratorResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(OrchestratorError::Timeout { op, timeout }),
    }
}
