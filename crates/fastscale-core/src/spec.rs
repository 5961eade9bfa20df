//! Validated, immutable per-service settings.

use std::time::Duration;

use serde::Serialize;

/// Connection count above which a scale-out is triggered, when unset.
pub const DEFAULT_SCALEOUT_THRESHOLD: u64 = 150;

/// Floor the doubling starts from, when unset.
pub const DEFAULT_MIN_DESIRED_COUNT: i64 = 5;

/// Probe period in seconds, when unset.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3;

/// Longest accepted probe period in seconds (one day).
pub const MAX_CHECK_INTERVAL_SECS: u64 = 86_400;

/// Settings for one managed service.
///
/// Built once by [`crate::AutoscalerConfig::validate`] and never mutated
/// afterwards. Each service loop owns its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    /// Status page scraped for the active connection count.
    pub status_url: String,
    /// Optional header attached to the status request.
    pub status_auth: Option<StatusAuth>,
    /// Scale out when the observed count is strictly above this.
    pub scaleout_threshold: u64,
    /// Doubling never starts from less than this.
    pub min_desired_count: i64,
    /// Probe period. Also the probe request timeout.
    #[serde(serialize_with = "serialize_secs")]
    pub check_interval: Duration,
    /// ECS cluster name.
    pub cluster: String,
    /// ECS service name.
    pub service: String,
    /// Incoming-webhook URL notified after a scale-out.
    pub webhook_url: Option<String>,
}

/// A single custom header sent with the status request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct StatusAuth {
    pub name: String,
    #[serde(skip_serializing)]
    pub value: String,
}

impl std::fmt::Debug for StatusAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusAuth")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl ServiceSpec {
    /// Minimal spec with defaults applied, for the given identifiers.
    pub fn new(
        status_url: impl Into<String>,
        cluster: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            status_url: status_url.into(),
            status_auth: None,
            scaleout_threshold: DEFAULT_SCALEOUT_THRESHOLD,
            min_desired_count: DEFAULT_MIN_DESIRED_COUNT,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            cluster: cluster.into(),
            service: service.into(),
            webhook_url: None,
        }
    }

    /// Next desired count for a scale-out from `current`.
    ///
    /// Doubles the current count, but never starts from less than
    /// `min_desired_count`.
    pub fn next_desired_count(&self, current: i64) -> i64 {
        if current < self.min_desired_count {
            self.min_desired_count.saturating_mul(2)
        } else {
            current.saturating_mul(2)
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
