//! Runs the extension hooks registered on a message.
//!
//! # Data Flow
//! ```text
//! greedy?  → read body (bounded)      → hooks see the complete body
//! tamper   → NoChange | ReplaceBody   → effective body
//! responder→ ShortCircuit             → synthetic response, stop
//! neither  → Continue { body: None }  → raw body streams through
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::config::{LimitConfig, TimeoutConfig};
use crate::error::ProxyError;
use crate::http::message::Message;
use crate::http::response::Response;
use crate::pipeline::body::read_to_limit;
use crate::pipeline::hooks::{Hook, HookResult};

/// Result of running the pipeline on one message.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Proceed normally. `None` means the raw body was never touched.
    Continue { body: Option<Bytes> },
    /// A hook answered; nothing else happens for this message.
    ShortCircuit { response: Response, body: Bytes },
}

/// Executes tamper and responder hooks with a buffering cap.
#[derive(Debug, Clone)]
pub struct ExtensionPipeline {
    max_buffered_body_bytes: usize,
    body_timeout: Duration,
}

impl ExtensionPipeline {
    pub fn new(limits: &LimitConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            max_buffered_body_bytes: limits.max_buffered_body_bytes,
            body_timeout: timeouts.upstream(),
        }
    }

    /// Run the hooks, allowing the full upstream timeout for buffering.
    pub async fn run<M: Message>(&self, msg: &mut M) -> Result<PipelineOutcome, ProxyError> {
        self.run_until(msg, Instant::now() + self.body_timeout).await
    }

    /// Run the hooks; a greedy body still incomplete at `deadline` fails
    /// with [`ProxyError::Timeout`].
    pub async fn run_until<M: Message>(
        &self,
        msg: &mut M,
        deadline: Instant,
    ) -> Result<PipelineOutcome, ProxyError> {
        let mut body = if msg.is_greedy() {
            let raw = msg.parts_mut().body.take()?;
            let buffered =
                tokio::time::timeout_at(deadline, read_to_limit(raw, self.max_buffered_body_bytes))
                    .await
                    .map_err(|_| ProxyError::Timeout(self.body_timeout))??;
            tracing::debug!(bytes = buffered.len(), "Buffered message body");
            Some(buffered)
        } else {
            None
        };

        let tamper = msg.parts_mut().hooks.tamper.take();
        if let Some(outcome) = apply(tamper, &mut body, msg)? {
            return Ok(outcome);
        }

        let responder = msg.parts_mut().hooks.responder.take();
        if let Some(outcome) = apply(responder, &mut body, msg)? {
            return Ok(outcome);
        }

        Ok(PipelineOutcome::Continue { body })
    }
}

/// Invoke one hook, updating `body` or producing a short-circuit.
fn apply<M: Message>(
    hook: Option<Hook<M>>,
    body: &mut Option<Bytes>,
    msg: &mut M,
) -> Result<Option<PipelineOutcome>, ProxyError> {
    let Some(hook) = hook else {
        return Ok(None);
    };

    match hook(body.as_ref(), msg) {
        HookResult::NoChange => Ok(None),
        HookResult::ReplaceBody(replacement) => {
            tracing::debug!(bytes = replacement.len(), "Hook replaced message body");
            *body = Some(replacement);
            Ok(None)
        }
        HookResult::ShortCircuit(descriptor) => {
            let (response, body) = Response::from_descriptor(descriptor)?;
            tracing::debug!(status = %response.status, "Hook short-circuited exchange");
            Ok(Some(PipelineOutcome::ShortCircuit { response, body }))
        }
    }
}
