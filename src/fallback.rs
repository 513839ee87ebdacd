//! Router-level error responses and the CORS preflight answer.
//!
//! Every client-visible failure is a small JSON envelope:
//!
//! ```json
//! {"status":404,"message":"Page not found"}
//! ```
//!
//! The `status` field is chosen by the caller and may differ from the HTTP
//! status (an invalid token is `401` on the wire with `"status":400` in the
//! body). No internal detail ever goes into the envelope.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS,
};
use http::{HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Rejection;
use crate::request::Request;
use crate::response::{ContentType, IntoResponse, Response};

/// Methods advertised to CORS preflight requests.
pub const CORS_ALLOW_METHODS: &str = "OPTIONS, HEAD, GET, POST, PUT, DELETE";

/// JSON error body shared by every rejection.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Envelope {
    pub status: u16,
    pub message: String,
}

impl Envelope {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status: status.as_u16(), message: message.into() }
    }

    /// Renders the envelope with HTTP status `code`.
    pub fn into_response(self, code: StatusCode) -> Response {
        let body = serde_json::to_vec(&self).unwrap_or_default();
        let mut res = Response::builder()
            .status(code)
            .bytes(ContentType::Json, body);
        res.headers_mut()
            .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        res
    }
}

pub(crate) async fn not_found(req: Request) -> Response {
    info!(url = %req.uri(), method = %req.method(), "Error 404 - Page not found");
    Rejection::NotFound.into_response()
}

/// 405 for a known path requested with the wrong method, except `OPTIONS`,
/// which gets the preflight answer instead.
pub(crate) async fn method_not_allowed(req: Request) -> Response {
    if req.method() == Method::OPTIONS {
        return preflight();
    }

    warn!(url = %req.uri(), method = %req.method(), "Error 405 - Method not allowed");
    Rejection::MethodNotAllowed.into_response()
}

fn preflight() -> Response {
    let mut res = Response::status(StatusCode::OK);
    let headers = res.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_ALLOW_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(CONTENT_TYPE, ContentType::Json.header_value());
    res
}
