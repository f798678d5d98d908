//! Bounded body buffering.

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use http_body::Body as _;
use http_body_util::BodyExt;

use crate::error::ProxyError;

/// Read `body` to the end, failing once more than `limit` bytes arrive.
///
/// A declared length above the limit fails before anything is read. Nothing
/// read so far is returned on failure.
pub async fn read_to_limit(mut body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    let limit_u64 = u64::try_from(limit).unwrap_or(u64::MAX);
    if body.size_hint().lower() > limit_u64 {
        return Err(ProxyError::BodyTooLarge { limit });
    }

    let mut buffer = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(ProxyError::Body)?;
        if let Ok(data) = frame.into_data() {
            if buffer.len() + data.len() > limit {
                return Err(ProxyError::BodyTooLarge { limit });
            }
            buffer.extend_from_slice(&data);
        }
    }
    Ok(buffer.freeze())
}
