//! Shutdown coordination for the proxy.

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Backed by a watch channel, so receivers that subscribe after the trigger
/// still observe it.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered (immediately if it already was).
    ///
    /// A dropped coordinator counts as a trigger.
    pub async fn recv(&mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
