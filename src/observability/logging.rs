//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Log every exchange through the `AccessLog` observer
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ProxyError;
use crate::http::{Message, Request, Response};
use crate::proxy::ProxyObserver;

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("intercept_proxy={level},tower_http={level}").into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Observer that logs requests, responses and errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLog;

impl ProxyObserver for AccessLog {
    fn on_request(&self, request: &mut Request) {
        tracing::info!(
            method = %request.method,
            url = %request.url(),
            version = request.http_version(),
            "Request received"
        );
    }

    fn on_response(&self, response: &mut Response) {
        tracing::info!(
            status = response.status.as_u16(),
            url = %response.request().map(|r| r.url()).unwrap_or_default(),
            "Response received"
        );
    }

    fn on_error(&self, error: &ProxyError) {
        tracing::warn!(error = %error, status = error.status_code().as_u16(), "Exchange failed");
    }
}
