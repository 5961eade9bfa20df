//! Where the configuration document comes from.
//!
//! Production reads it from SSM Parameter Store (SecureString, decrypted);
//! a local JSON or TOML file can be used instead.

use std::path::PathBuf;

use tracing::info;

use fastscale_core::{AutoscalerConfig, ConfigError, ConfigResult, ServiceSpec};

/// Default Parameter Store key holding the config document.
pub const DEFAULT_PARAM_KEY: &str = "/ecs/fast-autoscaler/config.json";

/// Default AWS region.
pub const DEFAULT_REGION: &str = "ap-northeast-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Parameter(String),
}

impl ConfigSource {
    /// A local file wins over the parameter key.
    pub fn select(file: Option<PathBuf>, param_key: String) -> Self {
        match file {
            Some(path) => Self::File(path),
            None => Self::Parameter(param_key),
        }
    }

    pub fn needs_aws(&self) -> bool {
        matches!(self, Self::Parameter(_))
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Parameter(name) => write!(f, "parameter {name}"),
        }
    }
}

/// Load, parse and validate the configuration.
///
/// `aws` is only consulted for [`ConfigSource::Parameter`].
pub async fn load_specs(
    source: &ConfigSource,
    aws: Option<&aws_config::SdkConfig>,
) -> ConfigResult<Vec<ServiceSpec>> {
    let config = match source {
        ConfigSource::File(path) => AutoscalerConfig::from_file(path)?,
        ConfigSource::Parameter(name) => {
            let aws = aws.ok_or_else(|| {
                ConfigError::Source("parameter store requires AWS configuration".to_string())
            })?;
            let client = aws_sdk_ssm::Client::new(aws);
            let doc = fetch_parameter(&client, name).await?;
            AutoscalerConfig::from_json_str(&doc)?
        }
    };

    let specs = config.validate()?;
    info!(%source, services = specs.len(), "configuration loaded");
    Ok(specs)
}

async fn fetch_parameter(client: &aws_sdk_ssm::Client, name: &str) -> ConfigResult<String> {
    let out = client
        .get_parameter()
        .name(name)
        .with_decryption(true)
        .send()
        .await
        .map_err(|e| {
            ConfigError::Source(format!(
                "get parameter {name}: {}",
                aws_sdk_ssm::error::DisplayErrorContext(&e)
            ))
        })?;

    out.parameter()
        .and_then(|p| p.value())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Source(format!("parameter {name} has no value")))
}
