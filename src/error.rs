//! Error taxonomy for the proxy core.
//!
//! # Design Decisions
//! - Every failure inside one exchange is a `ProxyError` and maps to exactly
//!   one HTTP status for the client that triggered it
//! - Lifecycle failures (`listen`/`close`) are `ServiceError` and go back to the caller
//! - Client-side protocol errors never produce a response; the connection is dropped

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::net::listener::ListenerError;

/// Failure of a single proxied exchange.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed header name/value or hook output.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A greedy message carried more than the configured buffer cap.
    #[error("body exceeds the {limit} byte buffer limit")]
    BodyTooLarge { limit: usize },

    /// The upstream did not answer in time.
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    /// Connect, DNS or protocol failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// Error while reading a body stream.
    #[error("failed to read body: {0}")]
    Body(#[source] axum::Error),

    /// The raw body was already taken by an earlier stage.
    #[error("message body was already consumed")]
    BodyConsumed,

    /// Neither an absolute URI nor a Host header named the destination.
    #[error("request has no destination host")]
    MissingHost,

    #[error("invalid destination host: {0}")]
    InvalidHost(String),

    /// CONNECT tunnels are not proxied.
    #[error("tunnelling via CONNECT is not supported")]
    TunnelUnsupported,

    /// Malformed inbound traffic at the transport layer.
    #[error("client connection error: {0}")]
    ClientProtocol(#[source] hyper::Error),
}

impl ProxyError {
    /// Status code reported to the client for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Validation(_) | ProxyError::BodyConsumed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::BodyTooLarge { .. } | ProxyError::Upstream(_) | ProxyError::Body(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::MissingHost | ProxyError::InvalidHost(_) => StatusCode::BAD_REQUEST,
            ProxyError::TunnelUnsupported => StatusCode::NOT_IMPLEMENTED,
            ProxyError::ClientProtocol(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether the client connection should be closed after the error reply.
    ///
    /// An oversized body is left unread on the socket, so the connection
    /// cannot be reused.
    pub fn closes_connection(&self) -> bool {
        matches!(self, ProxyError::BodyTooLarge { .. } | ProxyError::Body(_))
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.to_string()).into_response();
        if self.closes_connection() {
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
        }
        response
    }
}

/// Lifecycle failure of the proxy service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("the proxy is already listening")]
    AlreadyListening,

    #[error("the proxy is not listening")]
    NotListening,

    #[error("the proxy is already closing")]
    Closing,

    #[error(transparent)]
    Listener(#[from] ListenerError),
}
