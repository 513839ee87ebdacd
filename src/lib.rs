//! # bastion
//!
//! Per-route security for a radix-tree HTTP router.
//!
//! Every route carries a [`SecurityDescriptor`] that picks three things:
//!
//! - **Authentication**: a named protocol (`jwt` ships built in) that stands
//!   in front of the handler. Missing credentials can be optional; invalid
//!   ones never are. A route naming an unregistered protocol answers 401.
//! - **Content type**: JSON or HTML, applied when the handler sets none.
//! - **Logging**: method, URL, status and latency before and after every
//!   request, with bodies and headers on demand.
//!
//! Authorization (roles, permissions) is left to handlers; the verified
//! claims are there for them on [`Request::claims`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use bastion::{Config, Request, Response, SecureRouter, SecurityDescriptor, Server};
//! use http::Method;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("invalid configuration");
//!
//!     let app = SecureRouter::builder(config)
//!         .on(Method::GET, "/status", status)
//!         .on_secured(Method::GET, "/data", data, SecurityDescriptor::protocol("jwt"))
//!         .build();
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn status(_req: Request) -> Response {
//!     Response::json(r#"{"up":true}"#)
//! }
//!
//! async fn data(req: Request) -> Response {
//!     let user = req.claims().and_then(|c| c.get("user")).cloned();
//!     Response::json(serde_json::json!({ "user": user }).to_string())
//! }
//! ```

mod builtin;
mod capture;
mod config;
mod error;
mod fallback;
mod handler;
mod protocol;
mod request;
mod response;
mod router;
mod secure;
mod server;

pub mod middleware;

pub use capture::CapturedResponse;
pub use config::{Config, LogConfig, Secret};
pub use error::{Error, Rejection};
pub use fallback::{CORS_ALLOW_METHODS, Envelope};
pub use handler::{BoxFuture, BoxedHandler, Endpoint, Handler, boxed};
pub use middleware::jwt::{Claims, JwtError, JwtProtocol, JwtVerifier};
pub use protocol::{ProtocolFactory, ProtocolRegistry};
pub use request::{Request, RequestHead};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use secure::{ResponseFormat, SecureRouter, SecureRouterBuilder, SecurityDescriptor, ServeCallback};
pub use server::Server;
