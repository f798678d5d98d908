//! Writes the final response for the client.
//!
//! A supplied body is sent as-is with Content-Length recomputed when the
//! header exists; otherwise the upstream body is streamed through.

use axum::body::Body;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use hyper::ext::ReasonPhrase;

use crate::error::ProxyError;
use crate::http::Response;

/// Turn `response` into the transport response sent to the client.
pub fn reply(response: Response, body: Option<Bytes>) -> Result<http::Response<Body>, ProxyError> {
    let (status, status_message, mut parts) = response.into_parts();

    if let Some(body) = &body {
        if parts.headers.has_header(CONTENT_LENGTH.as_str()) {
            parts
                .headers
                .set(CONTENT_LENGTH.as_str(), body.len().to_string())?;
        }
    }

    let mut extensions = parts.extensions;
    extensions.remove::<ReasonPhrase>();
    if let Some(message) =
        status_message.filter(|message| Some(message.as_str()) != status.canonical_reason())
    {
        let reason = ReasonPhrase::try_from(message.clone())
            .map_err(|_| ProxyError::Validation(format!("invalid status message {message:?}")))?;
        extensions.insert(reason);
    }

    let body = match body {
        Some(bytes) => Body::from(bytes),
        None => parts.body.take()?,
    };

    let mut out = http::Response::new(body);
    *out.status_mut() = status;
    *out.headers_mut() = parts.headers.to_header_map()?;
    *out.extensions_mut() = extensions;
    Ok(out)
}
