//! Response model.
//!
//! # Responsibilities
//! - Wrap the upstream response with status, reason phrase and headers
//! - Build synthetic responses from a responder's descriptor
//! - Keep a lookup-only reference to the request that produced it
//!
//! # Design Decisions
//! - The status message is stored as received; the reply writer only emits
//!   it when it differs from the canonical reason
//! - Streaming stays possible: the upstream body is kept unread until the
//!   pipeline or the reply writer takes it

use std::sync::Arc;

use axum::body::Body;
use bytes::Bytes;
use http::{Extensions, StatusCode, Version};
use hyper::ext::ReasonPhrase;

use crate::error::ProxyError;
use crate::http::headers::HeaderStore;
use crate::http::message::{BodySource, Message, MessageParts};
use crate::http::request::RequestInfo;
use crate::pipeline::hooks::ResponseDescriptor;

/// A response on its way back to the client.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub status_message: Option<String>,
    request: Option<Arc<RequestInfo>>,
    parts: MessageParts<Response>,
}

impl Response {
    /// Wrap a response delivered by the upstream transport.
    pub fn from_upstream<B>(response: http::Response<B>, request: Arc<RequestInfo>) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<axum::BoxError>,
    {
        let (parts, body) = response.into_parts();
        let status_message = parts
            .extensions
            .get::<ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .or_else(|| parts.status.canonical_reason().map(str::to_string));

        Self {
            status: parts.status,
            status_message,
            request: Some(request),
            parts: MessageParts::new(
                HeaderStore::from_header_map(&parts.headers),
                parts.version,
                parts.extensions,
                BodySource::new(Body::new(body)),
            ),
        }
    }

    /// Build a synthetic response, returning it with the body to send.
    pub fn from_descriptor(descriptor: ResponseDescriptor) -> Result<(Self, Bytes), ProxyError> {
        let headers = HeaderStore::from_pairs(descriptor.headers)?;
        let response = Self {
            status: descriptor.status.unwrap_or(StatusCode::OK),
            status_message: descriptor.status_message,
            request: None,
            parts: MessageParts::new(
                headers,
                Version::HTTP_11,
                Extensions::new(),
                BodySource::empty(),
            ),
        };
        Ok((response, descriptor.body.unwrap_or_default()))
    }

    /// The request this response answers, when it came from an upstream.
    pub fn request(&self) -> Option<&RequestInfo> {
        self.request.as_deref()
    }

    pub(crate) fn into_parts(self) -> (StatusCode, Option<String>, MessageParts<Response>) {
        (self.status, self.status_message, self.parts)
    }
}

impl Message for Response {
    fn parts(&self) -> &MessageParts<Self> {
        &self.parts
    }

    fn parts_mut(&mut self) -> &mut MessageParts<Self> {
        &mut self.parts
    }
}
