//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! TOML file or defaults
//!     → loader.rs (read + toml::from_str)
//!     → validation.rs (every semantic error at once)
//!     → command-line overrides, validated again
//!     → ProxyConfig, owned by ProxyService
//! ```
//!
//! # Design Decisions
//! - Config is read-only once the service starts listening
//! - Every field is defaulted, so an empty file is valid

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_overrides, load_config, parse_config, ConfigError, ConfigOverrides};
pub use schema::{LimitConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig};
