//! One request/response cycle.
//!
//! # Data Flow
//! ```text
//! inbound request → Request → on_request → pipeline
//!     ├─ short-circuit → reply
//!     └─ forward → Response → on_response → pipeline → reply
//! ```
//!
//! Any failure becomes an error reply for this client only. A greedy request
//! body gets the whole upstream timeout to arrive; forwarding and buffering
//! the response share a second one.

use std::net::SocketAddr;

use axum::body::Body;
use axum::response::IntoResponse;
use bytes::Bytes;
use tokio::time::Instant;

use crate::error::ProxyError;
use crate::http::Request;
use crate::pipeline::{ExtensionPipeline, PipelineOutcome};
use crate::proxy::forwarder::Forwarder;
use crate::proxy::observer::Observers;
use crate::proxy::reply::reply;

/// Everything an exchange needs, shared read-only across connections.
pub(crate) struct Exchange {
    pub(crate) pipeline: ExtensionPipeline,
    pub(crate) forwarder: Forwarder,
    pub(crate) observers: Observers,
}

impl Exchange {
    /// Run one exchange to completion. Never fails: errors become replies.
    pub(crate) async fn handle<B>(&self, inbound: http::Request<B>) -> http::Response<Body>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<axum::BoxError>,
    {
        match self.run(inbound).await {
            Ok(response) => response,
            Err(err) => self.fail(err),
        }
    }

    async fn run<B>(&self, inbound: http::Request<B>) -> Result<http::Response<Body>, ProxyError>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<axum::BoxError>,
    {
        let mut request = Request::from_inbound(inbound)?;
        self.observers.request(&mut request);

        let body = match self.pipeline.run(&mut request).await? {
            PipelineOutcome::ShortCircuit { response, body } => {
                return reply(response, Some(body));
            }
            PipelineOutcome::Continue { body } => body,
        };

        let deadline = Instant::now() + self.forwarder.timeout();
        let mut response = self.forwarder.forward_until(request, body, deadline).await?;
        self.observers.response(&mut response);

        match self.pipeline.run_until(&mut response, deadline).await? {
            PipelineOutcome::ShortCircuit { response, body } => reply(response, Some(body)),
            PipelineOutcome::Continue { body } => reply(response, body),
        }
    }

    fn fail(&self, err: ProxyError) -> http::Response<Body> {
        match &err {
            ProxyError::Upstream(_) | ProxyError::Timeout(_) => {
                tracing::error!(error = %err, "Upstream exchange failed");
            }
            _ => tracing::warn!(error = %err, "Exchange failed"),
        }
        self.observers.error(&err);
        err.into_response()
    }

    /// Report a transport-level failure on a client connection.
    pub(crate) fn client_error(&self, peer: SocketAddr, err: hyper::Error) {
        let err = ProxyError::ClientProtocol(err);
        tracing::debug!(peer_addr = %peer, error = %err, "Client connection error");
        self.observers.error(&err);
    }
}
