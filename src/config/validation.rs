//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges. Every problem is
//! reported, not just the first.

use std::fmt;

use crate::config::schema::ProxyConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.timeouts.upstream_ms == 0 {
        errors.push(ValidationError::new("timeouts.upstream_ms", "must be greater than 0"));
    }
    if config.timeouts.idle_ms == 0 {
        errors.push(ValidationError::new("timeouts.idle_ms", "must be greater than 0"));
    }
    if config.limits.max_buffered_body_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_buffered_body_bytes",
            "must be greater than 0",
        ));
    }
    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.host = " ".into();
        config.timeouts.upstream_ms = 0;
        config.limits.max_buffered_body_bytes = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.host",
                "timeouts.upstream_ms",
                "limits.max_buffered_body_bytes",
                "observability.log_level",
            ]
        );
    }
}
