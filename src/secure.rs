//! The secure router: routing plus per-route security.
//!
//! Every route is registered with a [`SecurityDescriptor`] keyed by its path
//! template. At request time the descriptor decides the response content
//! type and which authentication protocol, if any, stands in front of the
//! handler.
//!
//! ```text
//! request ─► query log ─► lookup ─┬─ not found ──────────► 404 envelope
//!                                 ├─ wrong method ───────► 405 envelope / CORS preflight
//!                                 └─ found ─► descriptor ─┬─ no protocol ─► handler
//!                                                         ├─ unknown ─────► 401 (fail closed)
//!                                                         └─ protocol ────► middleware ─► handler
//!         ◄─ serve callback ◄─ response log ◄─ capture ◄──────────────────────────────┘
//! ```
//!
//! Tables are filled by [`SecureRouterBuilder`] and frozen by
//! [`SecureRouterBuilder::build`]. A built [`SecureRouter`] has no way to
//! register anything, so the tables are read without locks while serving.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use serde::Deserialize;
use tracing::info;

use crate::builtin;
use crate::capture::CapturedResponse;
use crate::config::Config;
use crate::error::Rejection;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::jwt::{self, JwtProtocol};
use crate::middleware::trace::RequestLogger;
use crate::protocol::{ProtocolFactory, ProtocolRegistry};
use crate::request::{Request, RequestHead};
use crate::response::{ContentType, IntoResponse, Response};
use crate::router::{Lookup, Router};

// ── Descriptors ───────────────────────────────────────────────────────────────

/// Content type applied to a route's responses.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(from = "String")]
pub enum ResponseFormat {
    #[default]
    Json,
    Html,
}

impl ResponseFormat {
    pub fn content_type(self) -> ContentType {
        match self {
            Self::Json => ContentType::Json,
            Self::Html => ContentType::Html,
        }
    }
}

/// Unknown formats fall back to JSON; parsing never fails.
impl FromStr for ResponseFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "html" => Self::Html,
            _ => Self::Json,
        })
    }
}

impl From<String> for ResponseFormat {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(format) => format,
            Err(never) => match never {},
        }
    }
}

/// Per-route security metadata.
///
/// The default descriptor requires nothing and answers JSON.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SecurityDescriptor {
    /// When false, a request without credentials still reaches the handler.
    /// A request with *invalid* credentials never does.
    pub require_auth: bool,
    /// Name of the protocol guarding the route. `None` or empty means no protocol.
    pub protocol: Option<String>,
    /// Free-form options for the protocol or the application.
    pub options: HashMap<String, String>,
    pub format: ResponseFormat,
}

impl SecurityDescriptor {
    /// `protocol` is required on this route.
    pub fn protocol(name: impl Into<String>) -> Self {
        Self { require_auth: true, protocol: Some(name.into()), ..Self::default() }
    }

    /// `protocol` is checked when credentials are sent, but not required.
    pub fn optional(name: impl Into<String>) -> Self {
        Self { require_auth: false, protocol: Some(name.into()), ..Self::default() }
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    fn protocol_name(&self) -> Option<&str> {
        self.protocol.as_deref().filter(|name| !name.is_empty())
    }
}

// ── Serve callback ────────────────────────────────────────────────────────────

/// Called once per request after the response is final, whatever the
/// logging toggles say.
pub type ServeCallback =
    Arc<dyn Fn(&RequestHead, &CapturedResponse<'_>, Instant) + Send + Sync + 'static>;

// ── Builder ───────────────────────────────────────────────────────────────────

/// Collects routes, descriptors and protocols during startup.
pub struct SecureRouterBuilder {
    router: Router,
    descriptors: HashMap<String, SecurityDescriptor>,
    protocols: ProtocolRegistry,
    logger: RequestLogger,
    on_serve: Option<ServeCallback>,
}

impl SecureRouterBuilder {
    fn new(config: Config) -> Self {
        let mut builder = Self {
            router: Router::new(),
            descriptors: HashMap::new(),
            protocols: ProtocolRegistry::new(),
            logger: RequestLogger::new(config.log, config.probe_path.clone()),
            on_serve: None,
        };

        if let Some(secret) = &config.jwt_secret {
            builder.protocols.insert(jwt::PROTOCOL_NAME, JwtProtocol::new(secret));
        }

        builder = builder
            .on(Method::GET, "/robots.txt", builtin::robots)
            .on(Method::GET, "/favicon.ico", builtin::favicon);
        if let Some(path) = &config.probe_path {
            builder = builder.any(path, builtin::probe);
        }
        builder
    }

    /// Registers an unsecured route for one method.
    ///
    /// # Panics
    ///
    /// Panics if `template` is invalid or already registered for `method`.
    pub fn on(self, method: Method, template: &str, handler: impl Handler) -> Self {
        self.on_secured(method, template, handler, SecurityDescriptor::default())
    }

    /// Registers a route for one method with its security descriptor.
    ///
    /// Descriptors are keyed by template, not by method: registering the same
    /// template again replaces the descriptor for every method.
    pub fn on_secured(
        self,
        method: Method,
        template: &str,
        handler: impl Handler,
        descriptor: SecurityDescriptor,
    ) -> Self {
        self.add(Some(method), template, handler.into_boxed_handler(), descriptor)
    }

    /// Registers an unsecured route answering every method.
    pub fn any(self, template: &str, handler: impl Handler) -> Self {
        self.any_secured(template, handler, SecurityDescriptor::default())
    }

    /// Registers a route answering every method with its security descriptor.
    pub fn any_secured(
        self,
        template: &str,
        handler: impl Handler,
        descriptor: SecurityDescriptor,
    ) -> Self {
        self.add(None, template, handler.into_boxed_handler(), descriptor)
    }

    /// Registers an authentication protocol under `name`, replacing any
    /// protocol of the same name (including the default `jwt`).
    pub fn protocol(mut self, name: impl Into<String>, factory: impl ProtocolFactory) -> Self {
        self.protocols.insert(name, factory);
        self
    }

    /// Installs a callback run after every request.
    pub fn on_serve<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestHead, &CapturedResponse<'_>, Instant) + Send + Sync + 'static,
    {
        self.on_serve = Some(Arc::new(callback));
        self
    }

    /// Freezes the tables.
    pub fn build(self) -> SecureRouter {
        let router = SecureRouter {
            router: self.router,
            descriptors: self.descriptors,
            protocols: self.protocols,
            logger: self.logger,
            on_serve: self.on_serve,
        };
        info!(
            routes = router.descriptors.len(),
            protocols = ?router.protocols.names(),
            "secure router built"
        );
        router
    }

    fn add(
        mut self,
        method: Option<Method>,
        template: &str,
        handler: BoxedHandler,
        descriptor: SecurityDescriptor,
    ) -> Self {
        self.router.add(method, template, handler);
        self.descriptors.insert(template.to_owned(), descriptor);
        self
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// A sealed routing table with per-route security.
///
/// Cheap to share: wrap in an `Arc` and call [`serve`](SecureRouter::serve)
/// from any number of tasks.
pub struct SecureRouter {
    router: Router,
    descriptors: HashMap<String, SecurityDescriptor>,
    protocols: ProtocolRegistry,
    logger: RequestLogger,
    on_serve: Option<ServeCallback>,
}

impl SecureRouter {
    pub fn builder(config: Config) -> SecureRouterBuilder {
        SecureRouterBuilder::new(config)
    }

    /// Descriptor registered for `template`, if any.
    pub fn descriptor(&self, template: &str) -> Option<&SecurityDescriptor> {
        self.descriptors.get(template)
    }

    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    /// Routes one request and produces one response. Never fails: every
    /// error becomes an HTTP response.
    pub async fn serve(&self, req: Request) -> Response {
        let started = Instant::now();
        self.logger.query(&req);
        let head = req.head();

        let res = self.dispatch(req).await;

        let capture = CapturedResponse::observe(&res);
        self.logger.response(&head, started, &capture);
        if let Some(callback) = &self.on_serve {
            callback(&head, &capture, started);
        }
        res
    }

    async fn dispatch(&self, mut req: Request) -> Response {
        let (route, params) = match self.router.lookup(req.method(), req.path()) {
            Lookup::Found { route, params } => (route, params),
            Lookup::MethodNotAllowed => return self.router.method_not_allowed.call(req).await,
            Lookup::NotFound => return self.router.not_found.call(req).await,
        };
        req.set_params(params);

        let default = SecurityDescriptor::default();
        let descriptor = self.descriptors.get(&*route.template).unwrap_or(&default);

        let mut res = match descriptor.protocol_name() {
            None => route.handler.call(req).await,
            Some(name) => match self.protocols.get(name) {
                Some(factory) => {
                    factory.build(route.handler, descriptor.require_auth).call(req).await
                }
                None => {
                    info!(url = %req.uri(), method = %req.method(), protocol = name, "Error 401 - Unauthorized");
                    Rejection::ProtocolNotRegistered(name.to_owned()).into_response()
                }
            },
        };
        res.default_content_type(descriptor.format.content_type());
        res
    }
}

impl fmt::Debug for SecureRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureRouter")
            .field("descriptors", &self.descriptors)
            .field("protocols", &self.protocols)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}
