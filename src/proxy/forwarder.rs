//! Upstream forwarding.
//!
//! # Responsibilities
//! - Turn a `Request` into an outbound request for `hostname:port`
//! - Send either the buffered body or the untouched inbound stream
//! - Enforce the upstream timeout (504 on expiry); the same deadline also
//!   bounds buffering of a greedy response body
//!
//! # Design Decisions
//! - Content-Length is rewritten only if the client sent one; chunked
//!   requests stay chunked
//! - The inbound transport extensions are carried over so the upstream sees
//!   the client's header casing
//! - Dropping the timed-out future aborts the outbound connection

use std::time::Duration;

use axum::body::Body;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::Uri;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::Instant;

use crate::config::TimeoutConfig;
use crate::error::ProxyError;
use crate::http::{Message, Request, Response};

/// Sends requests upstream over a shared pooled client.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .http1_preserve_header_case(true)
            .build(connector);

        Self {
            client,
            timeout: timeouts.upstream(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `request` upstream and wrap the reply.
    ///
    /// `body` is the buffered (possibly tampered) body; `None` streams the
    /// raw inbound body instead.
    pub async fn forward(&self, request: Request, body: Option<Bytes>) -> Result<Response, ProxyError> {
        self.forward_until(request, body, Instant::now() + self.timeout)
            .await
    }

    /// Like [`forward`](Self::forward), but the response head must arrive
    /// before `deadline`.
    pub async fn forward_until(
        &self,
        mut request: Request,
        body: Option<Bytes>,
        deadline: Instant,
    ) -> Result<Response, ProxyError> {
        if let Some(body) = &body {
            if request.headers().has_header(CONTENT_LENGTH.as_str()) {
                request
                    .headers_mut()
                    .set(CONTENT_LENGTH.as_str(), body.len().to_string())?;
            }
        }

        let uri: Uri = format!("http://{}{}", request.authority(), request.path)
            .parse()
            .map_err(|_| ProxyError::InvalidHost(request.host.clone()))?;
        let method = request.method.clone();
        let (info, mut parts) = request.into_parts();

        let body = match body {
            Some(bytes) => Body::from(bytes),
            None => parts.body.take()?,
        };
        let mut outbound = http::Request::new(body);
        *outbound.method_mut() = method;
        *outbound.uri_mut() = uri;
        *outbound.version_mut() = parts.version;
        *outbound.headers_mut() = parts.headers.to_header_map()?;
        *outbound.extensions_mut() = parts.extensions;

        tracing::debug!(
            method = %info.method,
            upstream = %outbound.uri(),
            "Forwarding request upstream"
        );

        let upstream = tokio::time::timeout_at(deadline, self.client.request(outbound))
            .await
            .map_err(|_| ProxyError::Timeout(self.timeout))??;

        tracing::debug!(status = %upstream.status(), "Upstream responded");
        Ok(Response::from_upstream(upstream, info))
    }
}
