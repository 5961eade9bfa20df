//! Desired-count read/write against Amazon ECS.

use std::future::Future;
use std::pin::Pin;

use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ecs::operation::describe_services::DescribeServicesOutput;
use tracing::debug;

use fastscale_core::ServiceSpec;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Boxed future alias for orchestrator calls.
pub type OrchestratorFuture<'a, T> =
    Pin<Box<dyn Future<Output = OrchestratorResult<T>> + Send + 'a>>;

/// Read and write a service's desired replica count — injected for
/// testability.
pub trait Orchestrator: Send + Sync {
    /// Current desired count of `(spec.cluster, spec.service)`.
    fn desired_count<'a>(&'a self, spec: &'a ServiceSpec) -> OrchestratorFuture<'a, i64>;

    /// Replace the desired count of `(spec.cluster, spec.service)`.
    fn set_desired_count<'a>(
        &'a self,
        spec: &'a ServiceSpec,
        next: i64,
    ) -> OrchestratorFuture<'a, ()>;
}

/// [`Orchestrator`] backed by the ECS API.
#[derive(Debug, Clone)]
pub struct EcsOrchestrator {
    client: aws_sdk_ecs::Client,
}

impl EcsOrchestrator {
    /// Build from a loaded AWS config (region and credentials).
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self::from_client(aws_sdk_ecs::Client::new(config))
    }

    pub fn from_client(client: aws_sdk_ecs::Client) -> Self {
        Self { client }
    }

    async fn describe(&self, spec: &ServiceSpec) -> OrchestratorResult<i64> {
        let out = self
            .client
            .describe_services()
            .cluster(&spec.cluster)
            .services(&spec.service)
            .send()
            .await
            .map_err(|e| OrchestratorError::Read {
                code: error_code(&e),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let count = desired_count_from(spec, &out)?;
        debug!(cluster = %spec.cluster, service = %spec.service, count, "desired count read");
        Ok(count)
    }

    async fn update(&self, spec: &ServiceSpec, next: i64) -> OrchestratorResult<()> {
        let desired = i32::try_from(next).map_err(|_| OrchestratorError::OutOfRange(next))?;

        self.client
            .update_service()
            .cluster(&spec.cluster)
            .service(&spec.service)
            .desired_count(desired)
            .send()
            .await
            .map_err(|e| OrchestratorError::Write {
                code: error_code(&e),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(cluster = %spec.cluster, service = %spec.service, next, "desired count written");
        Ok(())
    }
}

impl Orchestrator for EcsOrchestrator {
    fn desired_count<'a>(&'a self, spec: &'a ServiceSpec) -> OrchestratorFuture<'a, i64> {
        Box::pin(self.describe(spec))
    }

    fn set_desired_count<'a>(
        &'a self,
        spec: &'a ServiceSpec,
        next: i64,
    ) -> OrchestratorFuture<'a, ()> {
        Box::pin(self.update(spec, next))
    }
}

/// Pick the desired count out of a `DescribeServices` response.
///
/// ECS answers an unknown service with an empty `services` list and a
/// `MISSING` entry in `failures`, not with an error.
fn desired_count_from(
    spec: &ServiceSpec,
    out: &DescribeServicesOutput,
) -> OrchestratorResult<i64> {
    match out.services().first() {
        Some(svc) => Ok(i64::from(svc.desired_count())),
        None => {
            let reason = out
                .failures()
                .first()
                .and_then(|f| f.reason())
                .unwrap_or("no matching services")
                .to_string();
            Err(OrchestratorError::NotFound {
                cluster: spec.cluster.clone(),
                service: spec.service.clone(),
                reason,
            })
        }
    }
}

/// ECS error code, or a coarse bucket when the request never got an answer.
fn error_code<E: ProvideErrorMetadata>(err: &E) -> String {
    err.code().unwrap_or("Transport").to_string()
}
