//! HTTP message model.
//!
//! # Data Flow
//! ```text
//! transport request  → request.rs  (destination, Request)
//! upstream response  → response.rs (status message, Response)
//!                    ↘ message.rs  (headers, body source, hooks shared by both)
//!                    ↘ headers.rs  (case-insensitive multi-valued store)
//! ```

pub mod headers;
pub mod message;
pub mod request;
pub mod response;

pub use headers::{HeaderStore, HeaderValues};
pub use message::{BodySource, Message};
pub use request::{parse_host, Request, RequestInfo};
pub use response::Response;
