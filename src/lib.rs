//! Programmable HTTP/1.x forward proxy.
//!
//! Clients send absolute-URI requests; each one is forwarded to the named
//! host and the answer relayed back. Registered [`ProxyObserver`]s see every
//! request and response and can attach hooks that rewrite bodies or answer
//! without contacting the upstream.
//!
//! ```text
//!  client ──▶ net::Listener ──▶ proxy::service (HTTP/1 connection)
//!                                   │
//!                                   ▼
//!                            proxy::exchange ──▶ observers ──▶ pipeline
//!                                   │                              │
//!                                   ▼                   short-circuit reply
//!                            proxy::forwarder ──▶ upstream
//!                                   │
//!                                   ▼
//!                    observers ──▶ pipeline ──▶ proxy::reply ──▶ client
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod pipeline;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use crate::config::ProxyConfig;
pub use crate::error::{ProxyError, ServiceError};
pub use crate::http::{HeaderStore, Message, Request, Response};
pub use crate::pipeline::{HookResult, ResponseDescriptor};
pub use crate::proxy::{ProxyObserver, ProxyService};
