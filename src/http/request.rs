//! Inbound request model.
//!
//! # Responsibilities
//! - Wrap the transport request with its header store and body source
//! - Resolve the destination from the absolute URI or the Host header
//! - Split the destination into hostname and port (default 80)
//!
//! # Design Decisions
//! - Routing fields are public so observers can redirect a request
//! - Forwarding consumes the request; responses only keep a `RequestInfo`
//!   snapshot of it

use std::sync::Arc;

use axum::body::Body;
use bytes::Bytes;
use http::{Method, Version};

use crate::error::ProxyError;
use crate::http::headers::HeaderStore;
use crate::http::message::{BodySource, Message, MessageParts};

const DEFAULT_PORT: u16 = 80;

/// A request received from a client.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Path plus query string.
    pub path: String,
    /// Destination as written by the client (`host[:port]`).
    pub host: String,
    /// Destination name, brackets stripped for IPv6 literals.
    pub hostname: String,
    pub port: u16,
    parts: MessageParts<Request>,
}

impl Request {
    /// Wrap a request delivered by the transport.
    pub fn from_inbound<B>(request: http::Request<B>) -> Result<Self, ProxyError>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<axum::BoxError>,
    {
        let (parts, body) = request.into_parts();
        if parts.method == Method::CONNECT {
            return Err(ProxyError::TunnelUnsupported);
        }

        let headers = HeaderStore::from_header_map(&parts.headers);
        let host = match parts.uri.authority() {
            Some(authority) => authority.as_str().to_string(),
            None => headers
                .first("host")
                .filter(|host| !host.is_empty())
                .ok_or(ProxyError::MissingHost)?
                .to_string(),
        };
        let (hostname, port) = parse_host(&host)?;
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            method: parts.method,
            path,
            host,
            hostname,
            port,
            parts: MessageParts::new(
                headers,
                parts.version,
                parts.extensions,
                BodySource::new(Body::new(body)),
            ),
        })
    }

    /// Full URL of the destination.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.host, self.path)
    }

    /// Point the request at another `host[:port]`.
    pub fn set_host(&mut self, host: impl Into<String>) -> Result<(), ProxyError> {
        let host = host.into();
        let (hostname, port) = parse_host(&host)?;
        self.host = host;
        self.hostname = hostname;
        self.port = port;
        Ok(())
    }

    /// `hostname:port` as used to open the upstream connection.
    pub fn authority(&self) -> String {
        if self.hostname.contains(':') {
            format!("[{}]:{}", self.hostname, self.port)
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }

    /// Lookup-only snapshot kept by the response.
    pub fn info(&self) -> RequestInfo {
        RequestInfo {
            method: self.method.clone(),
            path: self.path.clone(),
            host: self.host.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
            version: self.parts.version,
            headers: self.parts.headers.clone(),
        }
    }

    pub(crate) fn into_parts(self) -> (Arc<RequestInfo>, MessageParts<Request>) {
        (Arc::new(self.info()), self.parts)
    }
}

impl Message for Request {
    fn parts(&self) -> &MessageParts<Self> {
        &self.parts
    }

    fn parts_mut(&mut self) -> &mut MessageParts<Self> {
        &mut self.parts
    }
}

/// Immutable view of a forwarded request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub path: String,
    pub host: String,
    pub hostname: String,
    pub port: u16,
    pub version: Version,
    pub headers: HeaderStore,
}

impl RequestInfo {
    pub fn url(&self) -> String {
        format!("http://{}{}", self.host, self.path)
    }
}

/// Split `host[:port]` into hostname and port.
///
/// Bracketed IPv6 literals are unwrapped; a missing port means 80.
pub fn parse_host(host: &str) -> Result<(String, u16), ProxyError> {
    let invalid = || ProxyError::InvalidHost(host.to_string());

    let (hostname, port) = if let Some(rest) = host.strip_prefix('[') {
        let (literal, tail) = rest.split_once(']').ok_or_else(invalid)?;
        match tail {
            "" => (literal, None),
            tail => (literal, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if !name.contains(':') => (name, Some(port)),
            Some(_) => return Err(invalid()),
            None => (host, None),
        }
    };

    if hostname.is_empty() {
        return Err(invalid());
    }
    let port = match port {
        Some(port) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            port.parse::<u16>().map_err(|_| invalid())?
        }
        Some(_) => return Err(invalid()),
        None => DEFAULT_PORT,
    };
    Ok((hostname.to_string(), port))
}
