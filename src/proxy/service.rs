//! Proxy service lifecycle.
//!
//! # Responsibilities
//! - Bind the listener and run the accept loop (`Idle → Listening`)
//! - Serve each connection over HTTP/1 with an idle timeout
//! - Stop accepting and drain connections on close (`Listening → Closing → Idle`)
//!
//! # Design Decisions
//! - Observers and configuration are fixed once listening starts
//! - In-flight exchanges finish on close; idle keep-alive connections are
//!   shut down gracefully
//! - Client connection errors go to observers, never to the caller

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::error::ServiceError;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::pipeline::ExtensionPipeline;
use crate::proxy::exchange::Exchange;
use crate::proxy::forwarder::Forwarder;
use crate::proxy::observer::{Observers, ProxyObserver};

enum ServiceState {
    Idle,
    Listening(Running),
    Closing,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    accept_task: JoinHandle<()>,
    tracker: ConnectionTracker,
}

/// A programmable forward proxy.
pub struct ProxyService {
    config: ProxyConfig,
    forwarder: Forwarder,
    observers: Vec<Arc<dyn ProxyObserver>>,
    state: Arc<Mutex<ServiceState>>,
}

impl ProxyService {
    pub fn new(config: ProxyConfig) -> Self {
        let forwarder = Forwarder::new(&config.timeouts);
        Self {
            config,
            forwarder,
            observers: Vec::new(),
            state: Arc::new(Mutex::new(ServiceState::Idle)),
        }
    }

    /// Register an observer. Observers are called in registration order.
    pub fn with_observer(self, observer: impl ProxyObserver + 'static) -> Self {
        self.with_shared_observer(Arc::new(observer))
    }

    /// Register an observer the caller keeps a handle to.
    pub fn with_shared_observer(mut self, observer: Arc<dyn ProxyObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub async fn is_listening(&self) -> bool {
        matches!(*self.state.lock().await, ServiceState::Listening(_))
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock().await {
            ServiceState::Listening(running) => Some(running.local_addr),
            _ => None,
        }
    }

    /// Start accepting connections on `host:port`. Port 0 picks a free port.
    pub async fn listen(&self, host: &str, port: u16) -> Result<SocketAddr, ServiceError> {
        let mut state = self.state.lock().await;
        match *state {
            ServiceState::Idle => {}
            ServiceState::Listening(_) => return Err(ServiceError::AlreadyListening),
            ServiceState::Closing => return Err(ServiceError::Closing),
        }

        let listener = Listener::bind(host, port, self.config.listener.max_connections).await?;
        let local_addr = listener.local_addr();

        let exchange = Arc::new(Exchange {
            pipeline: ExtensionPipeline::new(&self.config.limits, &self.config.timeouts),
            forwarder: self.forwarder.clone(),
            observers: Observers::new(self.observers.clone()),
        });
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            exchange,
            shutdown.subscribe(),
            tracker.clone(),
            self.config.timeouts.idle(),
        ));

        tracing::info!(address = %local_addr, "Proxy listening");
        *state = ServiceState::Listening(Running {
            local_addr,
            shutdown,
            accept_task,
            tracker,
        });
        Ok(local_addr)
    }

    /// Stop accepting connections and wait for open ones to finish.
    ///
    /// The drain runs on its own task: dropping the returned future does not
    /// interrupt it, and the service still returns to idle once every
    /// connection has closed.
    pub async fn close(&self) -> Result<(), ServiceError> {
        let running = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, ServiceState::Closing) {
                ServiceState::Listening(running) => running,
                ServiceState::Idle => {
                    *state = ServiceState::Idle;
                    return Err(ServiceError::NotListening);
                }
                ServiceState::Closing => return Err(ServiceError::Closing),
            }
        };

        tracing::info!(
            address = %running.local_addr,
            active_connections = running.tracker.open_count(),
            "Proxy closing"
        );
        let state = Arc::clone(&self.state);
        let drain = tokio::spawn(async move {
            running.shutdown.trigger();
            if let Err(err) = running.accept_task.await {
                tracing::error!(error = %err, "Accept loop terminated abnormally");
            }
            running.tracker.drained().await;

            *state.lock().await = ServiceState::Idle;
            tracing::info!("Proxy closed");
        });

        if let Err(err) = drain.await {
            tracing::error!(error = %err, "Drain task terminated abnormally");
        }
        Ok(())
    }
}

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// How long to wait before accepting again after `err`; `None` stops the loop.
fn accept_retry_delay(err: &ListenerError) -> Option<Duration> {
    match err {
        ListenerError::Closed => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

async fn accept_loop(
    listener: Listener,
    exchange: Arc<Exchange>,
    mut signal: ShutdownSignal,
    tracker: ConnectionTracker,
    idle_timeout: Duration,
) {
    loop {
        let accepted = tokio::select! {
            _ = signal.recv() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer, permit) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                let Some(delay) = accept_retry_delay(&err) else {
                    tracing::error!(error = %err, "Listener can no longer accept");
                    break;
                };
                // Persistent errors such as EMFILE would otherwise spin.
                tracing::warn!(
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Failed to accept connection"
                );
                tokio::select! {
                    _ = signal.recv() => break,
                    _ = tokio::time::sleep(delay) => continue,
                }
            }
        };

        let connection = tracker.open();
        let exchange = Arc::clone(&exchange);
        let signal = signal.clone();
        tokio::spawn(async move {
            tracing::trace!(%connection, peer_addr = %peer, "Serving connection");
            serve_connection(stream, peer, exchange, signal, idle_timeout).await;
            drop(permit);
            drop(connection);
        });
    }
    tracing::info!("Stopped accepting connections");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    exchange: Arc<Exchange>,
    mut signal: ShutdownSignal,
    idle_timeout: Duration,
) {
    let handler = Arc::clone(&exchange);
    let service = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<Incoming>| {
                tracing::info_span!(
                    "exchange",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .service_fn(move |request: http::Request<Incoming>| {
            let exchange = Arc::clone(&handler);
            async move { Ok::<_, Infallible>(exchange.handle(request).await) }
        });

    let mut builder = http1::Builder::new();
    builder
        .preserve_header_case(true)
        .timer(TokioTimer::new())
        .header_read_timeout(idle_timeout);
    let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = signal.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(err) = result {
        exchange.client_error(peer, err);
    }
}
