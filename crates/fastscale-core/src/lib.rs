//! fastscale-core — shared types for the fastscale autoscaler.
//!
//! The configuration document lists the services to watch. It is parsed
//! into an [`AutoscalerConfig`] and then validated into a list of immutable
//! [`ServiceSpec`]s, one per service loop.
//!
//! ```text
//! JSON / TOML document
//!   └── AutoscalerConfig::validate()
//!         ├── reject empty list / missing identifiers → ConfigError
//!         └── fill defaults (threshold 150, min count 5, interval 3s)
//!               → Vec<ServiceSpec>
//! ```

pub mod config;
pub mod error;
pub mod spec;

pub use config::{AutoscalerConfig, ServiceConfig};
pub use error::{ConfigError, ConfigResult};
pub use spec::{
    ServiceSpec, StatusAuth, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_MIN_DESIRED_COUNT,
    DEFAULT_SCALEOUT_THRESHOLD, MAX_CHECK_INTERVAL_SECS,
};
