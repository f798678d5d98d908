//! Live client connections.
//!
//! `close()` must not return while a connection is still being served, so
//! every accepted socket holds an [`OpenConnection`] until its task ends.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Counts open connections of one listening session.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    open: AtomicUsize,
    idle: Notify,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection until the returned handle is dropped.
    pub fn open(&self) -> OpenConnection {
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        OpenConnection {
            shared: Arc::clone(&self.shared),
            seq: NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn open_count(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Resolve once no connection is open.
    pub async fn drained(&self) {
        loop {
            // Register before checking so a release in between is not missed.
            let idle = self.shared.idle.notified();
            if self.open_count() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// One open connection. Dropping it releases the slot.
#[derive(Debug)]
pub struct OpenConnection {
    shared: Arc<Shared>,
    seq: u64,
}

impl fmt::Display for OpenConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.seq)
    }
}

impl Drop for OpenConnection {
    fn drop(&mut self) {
        if self.shared.open.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.idle.notify_waiters();
        }
        tracing::trace!(connection = %self, "Connection released");
    }
}
