//! Configuration document parser.
//!
//! The document is JSON (as stored in Parameter Store) with PascalCase keys:
//!
//! ```json
//! { "Services": [ { "StatusUrl": "...", "EcsClusterName": "...", "EcsServiceName": "..." } ] }
//! ```
//!
//! Local files may also be written as TOML with the same keys.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::spec::{
    ServiceSpec, StatusAuth, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_MIN_DESIRED_COUNT,
    DEFAULT_SCALEOUT_THRESHOLD, MAX_CHECK_INTERVAL_SECS,
};

/// The whole configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AutoscalerConfig {
    #[serde(rename = "Services", default)]
    pub services: Vec<ServiceConfig>,
}

/// One service entry, as written in the document.
///
/// Numeric fields left out or set to zero fall back to the defaults in
/// [`crate::spec`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceConfig {
    pub status_url: String,
    pub status_auth_name: String,
    pub status_auth_value: String,
    pub scaleout_threshold: i64,
    pub min_desired_count: i64,
    pub check_interval: i64,
    pub ecs_cluster_name: String,
    pub ecs_service_name: String,
    pub slack_webhook_url: String,
}

impl AutoscalerConfig {
    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a local file. `.toml` files are parsed as TOML, anything
    /// else as JSON.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Check every entry and resolve defaults.
    ///
    /// Fails if the list is empty, if any entry lacks a status URL, cluster
    /// name or service name, or if a numeric field is negative. A
    /// `CheckInterval` above [`MAX_CHECK_INTERVAL_SECS`] is also rejected.
    /// A single bad entry rejects the whole document.
    pub fn validate(self) -> ConfigResult<Vec<ServiceSpec>> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }
        self.services
            .into_iter()
            .enumerate()
            .map(|(index, svc)| svc.into_spec(index))
            .collect()
    }
}

impl ServiceConfig {
    fn into_spec(self, index: usize) -> ConfigResult<ServiceSpec> {
        require(index, "StatusUrl", &self.status_url)?;
        require(index, "EcsClusterName", &self.ecs_cluster_name)?;
        require(index, "EcsServiceName", &self.ecs_service_name)?;

        let scaleout_threshold =
            non_negative(index, "ScaleoutThreshold", self.scaleout_threshold)?;
        non_negative(index, "MinDesiredCount", self.min_desired_count)?;
        let check_interval = non_negative(index, "CheckInterval", self.check_interval)?;
        if check_interval > MAX_CHECK_INTERVAL_SECS {
            return Err(ConfigError::OutOfRange {
                index,
                field: "CheckInterval",
                value: self.check_interval,
                max: MAX_CHECK_INTERVAL_SECS,
            });
        }

        let status_auth = (!self.status_auth_name.trim().is_empty()).then(|| StatusAuth {
            name: self.status_auth_name.trim().to_string(),
            value: self.status_auth_value,
        });
        let webhook_url = Some(self.slack_webhook_url.trim().to_string()).filter(|u| !u.is_empty());

        Ok(ServiceSpec {
            status_url: self.status_url.trim().to_string(),
            status_auth,
            scaleout_threshold: or_default(scaleout_threshold, DEFAULT_SCALEOUT_THRESHOLD),
            min_desired_count: if self.min_desired_count == 0 {
                DEFAULT_MIN_DESIRED_COUNT
            } else {
                self.min_desired_count
            },
            check_interval: Duration::from_secs(or_default(
                check_interval,
                DEFAULT_CHECK_INTERVAL_SECS,
            )),
            cluster: self.ecs_cluster_name.trim().to_string(),
            service: self.ecs_service_name.trim().to_string(),
            webhook_url,
        })
    }
}

fn require(index: usize, field: &'static str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { index, field });
    }
    Ok(())
}

fn non_negative(index: usize, field: &'static str, value: i64) -> ConfigResult<u64> {
    u64::try_from(value).map_err(|_| ConfigError::Negative {
        index,
        field,
        value,
    })
}

fn or_default(value: u64, default: u64) -> u64 {
    if value == 0 { default } else { value }
}
