//! Lifecycle observers.
//!
//! Observers are called synchronously right after a request or response is
//! wrapped, before its hooks run. This is where hooks get registered:
//!
//! ```no_run
//! use intercept_proxy::http::{Message, Request};
//! use intercept_proxy::pipeline::{HookResult, ResponseDescriptor};
//! use intercept_proxy::proxy::ProxyObserver;
//! use http::StatusCode;
//!
//! struct BlockAdmin;
//!
//! impl ProxyObserver for BlockAdmin {
//!     fn on_request(&self, request: &mut Request) {
//!         if request.path.starts_with("/admin") {
//!             request.set_responder(|_, _| {
//!                 HookResult::respond(
//!                     ResponseDescriptor::new().status(StatusCode::FORBIDDEN).body("blocked"),
//!                 )
//!             });
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::error::ProxyError;
use crate::http::{Request, Response};

/// Receives proxy events. All methods default to doing nothing.
///
/// Implementations must return promptly; they run inline on the exchange.
pub trait ProxyObserver: Send + Sync {
    fn on_request(&self, _request: &mut Request) {}

    fn on_response(&self, _response: &mut Response) {}

    fn on_error(&self, _error: &ProxyError) {}
}

/// Fixed list of observers, shared read-only by every exchange.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    inner: Arc<Vec<Arc<dyn ProxyObserver>>>,
}

impl Observers {
    pub(crate) fn new(observers: Vec<Arc<dyn ProxyObserver>>) -> Self {
        Self {
            inner: Arc::new(observers),
        }
    }

    pub(crate) fn request(&self, request: &mut Request) {
        for observer in self.inner.iter() {
            observer.on_request(request);
        }
    }

    pub(crate) fn response(&self, response: &mut Response) {
        for observer in self.inner.iter() {
            observer.on_response(response);
        }
    }

    pub(crate) fn error(&self, error: &ProxyError) {
        for observer in self.inner.iter() {
            observer.on_error(error);
        }
    }
}
