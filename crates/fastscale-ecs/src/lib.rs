//! fastscale-ecs — orchestrator access.
//!
//! The autoscaler only needs two calls against the control plane: read a
//! service's desired count and write a new one. [`Orchestrator`] is that
//! seam; [`EcsOrchestrator`] implements it with `DescribeServices` and
//! `UpdateService`.
//!
//! Remote errors keep their ECS error code (`ServiceNotFoundException`,
//! `AccessDeniedException`, ...) so they can be logged as-is. Nothing here
//! retries: a failed call ends the current scale-out attempt.

pub mod client;
pub mod error;

pub use client::{EcsOrchestrator, Orchestrator, OrchestratorFuture};
pub use error::{OrchestratorError, OrchestratorOp, OrchestratorResult};
