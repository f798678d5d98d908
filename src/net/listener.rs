//! TCP listener with a bounded number of live connections.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - Accept connections, disabling Nagle's algorithm on each
//! - Enforce `max_connections` via a semaphore

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("connection limiter closed")]
    Closed,
}

/// A bounded TCP listener.
///
/// When the limit is reached, accepting waits until a connection finishes.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    pub async fn bind(host: &str, port: u16, max_connections: usize) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: format!("{host}:{port}"),
            source,
        };
        let listener = TcpListener::bind((host, port)).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(address = %local_addr, max_connections, "Listener bound");

        Ok(Self {
            inner: listener,
            local_addr,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// The returned permit must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::warn!(peer_addr = %addr, error = %err, "Failed to set TCP_NODELAY");
        }

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Address actually bound, with the real port when 0 was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

/// A connection slot, released on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
