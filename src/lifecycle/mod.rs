//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls ProxyService::close
//!
//! Shutdown (shutdown.rs):
//!     close() → trigger → accept loop stops → connections drain → Idle
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
