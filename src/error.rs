//! Error types.
//!
//! Two families live here. [`Error`] surfaces infrastructure failures
//! (binding a port, reading configuration) to the program that owns the
//! server. [`Rejection`] is why a single request was refused; it never
//! escapes the router and always ends as an envelope response.

use http::StatusCode;

use crate::fallback::Envelope;
use crate::response::{IntoResponse, Response};

/// The error type returned by bastion's fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config: {0}")]
    ConfigInvalid(String),
}

/// Why a request was refused before (or instead of) reaching its handler.
///
/// Callers log the rejection with request context; the response carries
/// only the envelope.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("no route matches the request path")]
    NotFound,

    #[error("method not allowed for the request path")]
    MethodNotAllowed,

    /// The route's descriptor names a protocol nobody registered.
    #[error("protocol `{0}` is not registered")]
    ProtocolNotRegistered(String),

    #[error("missing credential")]
    MissingCredential,

    /// Detail is for server logs only.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

impl Rejection {
    /// HTTP status sent on the wire.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::ProtocolNotRegistered(_)
            | Self::MissingCredential
            | Self::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Envelope returned to the client.
    pub fn envelope(&self) -> Envelope {
        match self {
            Self::NotFound => Envelope::new(StatusCode::NOT_FOUND, "Page not found"),
            Self::MethodNotAllowed => Envelope::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
            Self::ProtocolNotRegistered(_) => Envelope::new(StatusCode::UNAUTHORIZED, "Unauthorized"),
            Self::MissingCredential => Envelope::new(StatusCode::UNAUTHORIZED, "Empty token"),
            Self::InvalidCredential(_) => Envelope::new(StatusCode::BAD_REQUEST, "Invalid token"),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let code = self.status_code();
        self.envelope().into_response(code)
    }
}
