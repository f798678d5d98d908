//! Extension pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Request/Response (hooks registered by observers)
//!     → extensions.rs (buffer if greedy, tamper, respond)
//!     → body.rs (bounded read of the raw stream)
//!     → PipelineOutcome (continue with body, or short-circuit)
//! ```
//!
//! # Design Decisions
//! - Hooks never see a partial body: greedy messages are fully buffered first
//! - Non-greedy messages are never read here, so they stream untouched
//! - At most one tamper and one responder hook per message

pub mod body;
pub mod extensions;
pub mod hooks;

pub use extensions::{ExtensionPipeline, PipelineOutcome};
pub use hooks::{Hook, HookResult, ResponseDescriptor};
