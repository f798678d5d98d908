//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields)
//!     → an `exchange` span per request (request ID, method, URI)
//!
//! Consumers:
//!     → logging.rs (fmt subscriber, AccessLog observer)
//! ```

pub mod logging;

pub use logging::{init_logging, AccessLog};
