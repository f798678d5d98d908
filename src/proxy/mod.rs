//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! service.rs   (listen/close, accept loop, HTTP/1 connections)
//!     → exchange.rs (one request/response cycle)
//!         → observer.rs (on_request / on_response / on_error)
//!         → forwarder.rs (upstream request, timeout)
//!         → reply.rs (buffered write or stream-through)
//! ```

pub mod exchange;
pub mod forwarder;
pub mod observer;
pub mod reply;
pub mod service;

pub use forwarder::Forwarder;
pub use observer::ProxyObserver;
pub use reply::reply;
pub use service::ProxyService;
