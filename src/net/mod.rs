//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limit, TCP_NODELAY)
//!     → connection.rs (open-connection count for draining)
//!     → hand off to the HTTP/1 connection in proxy::service
//! ```

pub mod connection;
pub mod listener;

pub use connection::{ConnectionTracker, OpenConnection};
pub use listener::{ConnectionPermit, Listener, ListenerError};
