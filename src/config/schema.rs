//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Buffering limits for greedy messages.
    pub limits: LimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "127.0.0.1", "0.0.0.0").
    pub host: String,

    /// Port to bind; 0 picks an ephemeral port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for the upstream to answer a forwarded request.
    pub upstream_ms: u64,

    /// Idle time allowed on a client connection before it is closed.
    pub idle_ms: u64,
}

impl TimeoutConfig {
    pub fn upstream(&self) -> Duration {
        Duration::from_millis(self.upstream_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream_ms: 2 * 3600 * 1000,
            idle_ms: 2 * 3600 * 1000,
        }
    }
}

/// Limits for bodies buffered in memory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Hard cap on a greedy message body, in bytes.
    pub max_buffered_body_bytes: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_buffered_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
