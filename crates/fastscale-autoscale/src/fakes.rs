//! In-memory probe, orchestrator and notifier for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use fastscale_core::ServiceSpec;
use fastscale_ecs::{Orchestrator, OrchestratorError, OrchestratorFuture};
use fastscale_notify::{NotifyError, NotifyFuture, Notifier, ScaleOutEvent};
use fastscale_probe::{ProbeError, ProbeFuture, StatusProbe};

/// Scripted probe reply.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reply {
    Count(u64),
    Transport,
    Parse,
}

/// Replays a per-service script of replies, then repeats the fallback.
#[derive(Debug)]
pub(crate) struct FakeProbe {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Reply,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeProbe {
    pub(crate) fn constant(reply: Reply) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: reply,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn script(self, service: &str, replies: &[Reply]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(service.to_string(), replies.iter().copied().collect());
        self
    }

    pub(crate) fn calls(&self, service: &str) -> usize {
        self.calls.lock().unwrap().get(service).copied().unwrap_or(0)
    }
}

impl StatusProbe for FakeProbe {
    fn fetch<'a>(&'a self, spec: &'a ServiceSpec) -> ProbeFuture<'a> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(spec.service.clone())
            .or_default() += 1;
        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&spec.service)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.fallback);

        Box::pin(async move {
            match reply {
                Reply::Count(n) => Ok(n),
                Reply::Transport => Err(ProbeError::Transport("connection refused".to_string())),
                Reply::Parse => Err(ProbeError::Parse("no marker".to_string())),
            }
        })
    }
}

/// Desired counts kept in a map keyed by service name.
#[derive(Debug, Default)]
pub(crate) struct FakeOrchestrator {
    counts: Mutex<HashMap<String, i64>>,
    fail_reads: bool,
    fail_writes: bool,
    write_delay: Duration,
    reads: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, i64)>>,
}

impl FakeOrchestrator {
    pub(crate) fn with_count(service: &str, count: i64) -> Self {
        let orch = Self::default();
        orch.counts.lock().unwrap().insert(service.to_string(), count);
        orch
    }

    pub(crate) fn and_count(self, service: &str, count: i64) -> Self {
        self.counts.lock().unwrap().insert(service.to_string(), count);
        self
    }

    pub(crate) fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub(crate) fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub(crate) fn count(&self, service: &str) -> Option<i64> {
        self.counts.lock().unwrap().get(service).copied()
    }

    pub(crate) fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> Vec<(String, i64)> {
        self.writes.lock().unwrap().clone()
    }
}

impl Orchestrator for FakeOrchestrator {
    fn desired_count<'a>(&'a self, spec: &'a ServiceSpec) -> OrchestratorFuture<'a, i64> {
        Box::pin(async move {
            self.reads.lock().unwrap().push(spec.service.clone());
            if self.fail_reads {
                return Err(OrchestratorError::Read {
                    code: "ClusterNotFoundException".to_string(),
                    message: "cluster not found".to_string(),
                });
            }
            self.count(&spec.service)
                .ok_or_else(|| OrchestratorError::NotFound {
                    cluster: spec.cluster.clone(),
                    service: spec.service.clone(),
                    reason: "MISSING".to_string(),
                })
        })
    }

    fn set_desired_count<'a>(
        &'a self,
        spec: &'a ServiceSpec,
        next: i64,
    ) -> OrchestratorFuture<'a, ()> {
        Box::pin(async move {
            if !self.write_delay.is_zero() {
                tokio::time::sleep(self.write_delay).await;
            }
            if self.fail_writes {
                return Err(OrchestratorError::Write {
                    code: "ServiceNotActiveException".to_string(),
                    message: "service not active".to_string(),
                });
            }
            self.writes.lock().unwrap().push((spec.service.clone(), next));
            self.counts.lock().unwrap().insert(spec.service.clone(), next);
            Ok(())
        })
    }
}

/// A delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Sent {
    pub target: Option<String>,
    pub service: String,
    pub active_connections: u64,
    pub current_count: i64,
    pub new_count: i64,
}

/// Records every notification; optionally reports failure after recording.
#[derive(Debug, Default)]
pub(crate) struct FakeNotifier {
    fail: bool,
    sent: Mutex<Vec<Sent>>,
}

impl FakeNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for FakeNotifier {
    fn notify<'a>(&'a self, target: Option<&'a str>, event: ScaleOutEvent<'a>) -> NotifyFuture<'a> {
        self.sent.lock().unwrap().push(Sent {
            target: target.map(str::to_string),
            service: event.service.to_string(),
            active_connections: event.active_connections,
            current_count: event.current_count,
            new_count: event.new_count,
        });
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(NotifyError::Status(502))
            } else {
                Ok(())
            }
        })
    }
}
