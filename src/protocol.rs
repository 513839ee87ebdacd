//! Authentication protocols and the registry that names them.
//!
//! A protocol is a factory: given the route's handler and the route's
//! `require_auth` flag, it returns a handler that authenticates first and
//! then either forwards to the route's handler or answers with a rejection.
//!
//! ```rust
//! use bastion::{
//!     boxed, BoxedHandler, Config, Endpoint, IntoResponse, Rejection, Request, Response,
//!     SecureRouter, SecurityDescriptor,
//! };
//! use http::Method;
//!
//! // An API-key protocol written as a closure.
//! let api_key = |next: BoxedHandler, require_auth: bool| -> BoxedHandler {
//!     boxed(move |req: Request| {
//!         let next = next.clone();
//!         async move {
//!             let key = req.header("x-api-key").map(str::to_owned);
//!             match key.as_deref() {
//!                 Some("let-me-in") => next.call(req).await,
//!                 None if !require_auth => next.call(req).await,
//!                 Some(_) => Rejection::InvalidCredential("unknown key".into()).into_response(),
//!                 None => Rejection::MissingCredential.into_response(),
//!             }
//!         }
//!     })
//! };
//!
//! async fn report(_req: Request) -> Response { Response::json(r#"{"ok":true}"#) }
//!
//! let router = SecureRouter::builder(Config::default())
//!     .protocol("api-key", api_key)
//!     .on_secured(Method::GET, "/report", report, SecurityDescriptor::protocol("api-key"))
//!     .build();
//! # let _ = router;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::BoxedHandler;

/// Builds authentication middleware around a route's handler.
pub trait ProtocolFactory: Send + Sync + 'static {
    fn build(&self, next: BoxedHandler, require_auth: bool) -> BoxedHandler;
}

impl<F> ProtocolFactory for F
where
    F: Fn(BoxedHandler, bool) -> BoxedHandler + Send + Sync + 'static,
{
    fn build(&self, next: BoxedHandler, require_auth: bool) -> BoxedHandler {
        self(next, require_auth)
    }
}

/// Protocol name → factory.
///
/// Filled by [`SecureRouterBuilder::protocol`](crate::SecureRouterBuilder::protocol)
/// and frozen when the router is built. There is no way to reach a registry
/// mutably once serving has started, so lookups need no locking.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    factories: HashMap<String, Arc<dyn ProtocolFactory>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    pub(crate) fn insert(&mut self, name: impl Into<String>, factory: impl ProtocolFactory) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ProtocolFactory>> {
        self.factories.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolRegistry").field("names", &self.names()).finish()
    }
}
