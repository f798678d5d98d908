//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Values given on the command line; each one replaces the loaded setting.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Apply `overrides` and validate the result again.
pub fn apply_overrides(
    mut config: ProxyConfig,
    overrides: ConfigOverrides,
) -> Result<ProxyConfig, ConfigError> {
    if let Some(host) = overrides.host {
        config.listener.host = host;
    }
    if let Some(port) = overrides.port {
        config.listener.port = port;
    }
    if let Some(level) = overrides.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
