//! Supervisor — one task per service loop, shared shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use fastscale_core::ServiceSpec;
use fastscale_ecs::Orchestrator;
use fastscale_notify::Notifier;
use fastscale_probe::StatusProbe;

use crate::scaleout::ORCHESTRATOR_CALL_TIMEOUT;
use crate::service_loop::{LoopState, ServiceLoop};

/// Final state of one loop, or `None` if its task panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub service: String,
    pub state: Option<LoopState>,
}

/// Starts a [`ServiceLoop`] per service and waits for all of them.
///
/// The probe, orchestrator and notifier handles are stateless and shared;
/// each loop owns its spec and its state.
pub struct Supervisor {
    probe: Arc<dyn StatusProbe>,
    orchestrator: Arc<dyn Orchestrator>,
    notifier: Arc<dyn Notifier>,
    call_timeout: Duration,
}

impl Supervisor {
    pub fn new(
        probe: Arc<dyn StatusProbe>,
        orchestrator: Arc<dyn Orchestrator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            probe,
            orchestrator,
            notifier,
            call_timeout: ORCHESTRATOR_CALL_TIMEOUT,
        }
    }

    /// Override the per-call orchestrator timeout used by every loop.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Spawn every loop and wait until all have stopped.
    ///
    /// Loops stop when `cancel` fires. A loop that panics is reported and
    /// does not affect the others.
    pub async fn run(&self, specs: Vec<ServiceSpec>, cancel: CancellationToken) -> Vec<LoopReport> {
        let handles: Vec<(String, JoinHandle<LoopState>)> = specs
            .into_iter()
            .map(|spec| {
                let service_loop = ServiceLoop::new(
                    spec,
                    self.probe.clone(),
                    self.orchestrator.clone(),
                    self.notifier.clone(),
                )
                .with_call_timeout(self.call_timeout);
                let service = service_loop.spec().service.clone();
                let handle = tokio::spawn(service_loop.run(cancel.child_token()));
                (service, handle)
            })
            .collect();

        info!(loops = handles.len(), "service loops started");

        let mut reports = Vec::with_capacity(handles.len());
        for (service, handle) in handles {
            let state = match handle.await {
                Ok(state) => Some(state),
                Err(e) => {
                    error!(%service, error = %e, "service loop task failed");
                    None
                }
            };
            reports.push(LoopReport { service, state });
        }

        info!("all service loops stopped");
        reports
    }
}
