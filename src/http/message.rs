//! State shared by requests and responses.
//!
//! # Responsibilities
//! - Own the header store, HTTP version and transport extensions
//! - Own the raw body as a consume-once source
//! - Hold the extension hooks registered for this message
//!
//! # Design Decisions
//! - `Message` is a trait over `MessageParts` so the pipeline is written once
//!   for both directions
//! - The transport extensions travel with the message so the wire casing of
//!   header names and custom reason phrases survive the round trip

use std::fmt;

use axum::body::Body;
use bytes::Bytes;
use http::{Extensions, Version};
use http_body::{Body as _, SizeHint};

use crate::error::ProxyError;
use crate::http::headers::HeaderStore;
use crate::pipeline::hooks::{Hook, HookResult};

/// Raw body of a message. It can be taken exactly once.
pub struct BodySource {
    body: Option<Body>,
}

impl BodySource {
    pub fn new(body: Body) -> Self {
        Self { body: Some(body) }
    }

    pub fn empty() -> Self {
        Self::new(Body::empty())
    }

    /// Take ownership of the raw stream.
    ///
    /// Fails with [`ProxyError::BodyConsumed`] on every call after the first.
    pub fn take(&mut self) -> Result<Body, ProxyError> {
        self.body.take().ok_or(ProxyError::BodyConsumed)
    }

    pub fn is_consumed(&self) -> bool {
        self.body.is_none()
    }

    /// Size announced by the transport, if the body is still present.
    pub fn size_hint(&self) -> Option<SizeHint> {
        self.body.as_ref().map(|body| body.size_hint())
    }
}

impl fmt::Debug for BodySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodySource")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// Extension hooks attached to one message.
pub struct Hooks<M> {
    pub(crate) greedy: bool,
    pub(crate) tamper: Option<Hook<M>>,
    pub(crate) responder: Option<Hook<M>>,
}

impl<M> Default for Hooks<M> {
    fn default() -> Self {
        Self {
            greedy: false,
            tamper: None,
            responder: None,
        }
    }
}

impl<M> fmt::Debug for Hooks<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("greedy", &self.greedy)
            .field("tamper", &self.tamper.is_some())
            .field("responder", &self.responder.is_some())
            .finish()
    }
}

/// Fields every message carries.
#[derive(Debug)]
pub struct MessageParts<M> {
    pub(crate) headers: HeaderStore,
    pub(crate) version: Version,
    pub(crate) extensions: Extensions,
    pub(crate) body: BodySource,
    pub(crate) hooks: Hooks<M>,
}

impl<M> MessageParts<M> {
    pub(crate) fn new(
        headers: HeaderStore,
        version: Version,
        extensions: Extensions,
        body: BodySource,
    ) -> Self {
        Self {
            headers,
            version,
            extensions,
            body,
            hooks: Hooks::default(),
        }
    }
}

/// Common behaviour of [`Request`](crate::http::Request) and
/// [`Response`](crate::http::Response).
pub trait Message: Sized {
    fn parts(&self) -> &MessageParts<Self>;

    fn parts_mut(&mut self) -> &mut MessageParts<Self>;

    fn headers(&self) -> &HeaderStore {
        &self.parts().headers
    }

    fn headers_mut(&mut self) -> &mut HeaderStore {
        &mut self.parts_mut().headers
    }

    fn version(&self) -> Version {
        self.parts().version
    }

    /// Version as it appears after `HTTP/` on the start line.
    fn http_version(&self) -> &'static str {
        match self.parts().version {
            Version::HTTP_09 => "0.9",
            Version::HTTP_10 => "1.0",
            Version::HTTP_2 => "2.0",
            Version::HTTP_3 => "3.0",
            _ => "1.1",
        }
    }

    /// Whether the body is buffered before hooks and forwarding run.
    ///
    /// A registered tamper hook always makes the message greedy.
    fn is_greedy(&self) -> bool {
        let hooks = &self.parts().hooks;
        hooks.greedy || hooks.tamper.is_some()
    }

    fn set_greedy(&mut self, greedy: bool) {
        self.parts_mut().hooks.greedy = greedy;
    }

    /// Register the tamper hook, replacing any previous one.
    ///
    /// The hook runs once with the fully buffered body.
    fn set_tamper<F>(&mut self, hook: F)
    where
        F: FnOnce(Option<&Bytes>, &mut Self) -> HookResult + Send + Sync + 'static,
    {
        if self.parts_mut().hooks.tamper.replace(Box::new(hook)).is_some() {
            tracing::debug!("Replaced previously registered tamper hook");
        }
    }

    /// Register the responder hook, replacing any previous one.
    ///
    /// The hook receives the effective body, which is `None` for a
    /// non-greedy message.
    fn set_responder<F>(&mut self, hook: F)
    where
        F: FnOnce(Option<&Bytes>, &mut Self) -> HookResult + Send + Sync + 'static,
    {
        if self.parts_mut().hooks.responder.replace(Box::new(hook)).is_some() {
            tracing::debug!("Replaced previously registered responder hook");
        }
    }

    fn has_tamper(&self) -> bool {
        self.parts().hooks.tamper.is_some()
    }

    fn has_responder(&self) -> bool {
        self.parts().hooks.responder.is_some()
    }
}
