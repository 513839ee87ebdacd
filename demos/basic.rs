//! Minimal bastion example: open, optional and required JWT routes.
//!
//! Run with:
//!   RUST_LOG=debug JWT_SECRET=change-me PROBE_PATH=/healthz LOG_QUERY=1 LOG_RESPONSE=1 \
//!     cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/status
//!   curl http://localhost:3000/me                         # anonymous
//!   curl http://localhost:3000/data                       # 401 Empty token
//!   curl -H 'Authorization: Bearer <token>' http://localhost:3000/data
//!   curl -X OPTIONS -i http://localhost:3000/data         # CORS preflight
//!   curl http://localhost:3000/healthz

use bastion::{Config, Request, Response, ResponseFormat, SecureRouter, SecurityDescriptor, Server};
use http::Method;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("JSON_LOGS").is_ok_and(|v| v == "1") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env().expect("invalid configuration");

    let app = SecureRouter::builder(config)
        .on(Method::GET, "/status", status)
        .on_secured(Method::GET, "/me", me, SecurityDescriptor::optional("jwt"))
        .on_secured(Method::GET, "/data", data, SecurityDescriptor::protocol("jwt"))
        .on_secured(
            Method::GET,
            "/about",
            about,
            SecurityDescriptor::default().with_format(ResponseFormat::Html),
        )
        .on_serve(|head, capture, started| {
            tracing::info!(
                method = %head.method,
                path = head.path(),
                status = capture.status.as_u16(),
                elapsed = ?started.elapsed(),
                "served"
            );
        })
        .build();

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /status
async fn status(_req: Request) -> Response {
    Response::json(r#"{"up":true}"#)
}

// GET /me: claims when a valid token is sent, anonymous otherwise.
async fn me(req: Request) -> Response {
    match req.claims() {
        Some(claims) => Response::json(claims.to_json()),
        None => Response::json(r#"{"anonymous":true}"#),
    }
}

// GET /data: only reachable with a valid token.
async fn data(req: Request) -> Response {
    let user = req.claims().and_then(|c| c.get("user")).cloned().unwrap_or_default();
    Response::json(serde_json::json!({ "user": user, "items": [1, 2, 3] }).to_string())
}

// GET /about: a plain String, sent as HTML by the route's format.
async fn about(_req: Request) -> String {
    "<h1>bastion demo</h1>".to_owned()
}
