//! Hook signatures and their results.

use bytes::Bytes;
use http::StatusCode;

/// A tamper or responder hook for messages of type `M`.
///
/// Hooks are called at most once, with the buffered body (if any) and
/// mutable access to the message so they can also rewrite headers.
pub type Hook<M> = Box<dyn FnOnce(Option<&Bytes>, &mut M) -> HookResult + Send + Sync>;

/// What a hook asks the pipeline to do next.
#[derive(Debug, Clone, Default)]
pub enum HookResult {
    /// Keep the current body.
    #[default]
    NoChange,
    /// Use these bytes as the body from now on.
    ReplaceBody(Bytes),
    /// Stop here and answer with a locally built response.
    ShortCircuit(ResponseDescriptor),
}

impl HookResult {
    pub fn replace(body: impl Into<Bytes>) -> Self {
        HookResult::ReplaceBody(body.into())
    }

    pub fn respond(descriptor: ResponseDescriptor) -> Self {
        HookResult::ShortCircuit(descriptor)
    }
}

/// Synthetic response returned by a responder hook.
///
/// Missing fields fall back to status 200, no headers and an empty body.
#[derive(Debug, Clone, Default)]
pub struct ResponseDescriptor {
    pub status: Option<StatusCode>,
    pub status_message: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl ResponseDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}
