//! The `jwt` authentication protocol.
//!
//! Verifies an HMAC-signed bearer token and hands its claims to the route's
//! handler as a typed request extension:
//!
//! ```rust,no_run
//! use bastion::Request;
//!
//! async fn whoami(req: Request) -> String {
//!     match req.claims().and_then(|c| c.get("user")) {
//!         Some(user) => format!("hello {user}"),
//!         None => "hello stranger".to_owned(),
//!     }
//! }
//! ```
//!
//! | Request | `require_auth = true` | `require_auth = false` |
//! |---|---|---|
//! | `OPTIONS` | forwarded | forwarded |
//! | no `Authorization` | 401 `Empty token` | forwarded, no claims |
//! | invalid token | 401 `Invalid token` | 401 `Invalid token` |
//! | valid token | forwarded with claims | forwarded with claims |

use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::Method;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Secret;
use crate::error::Rejection;
use crate::handler::{BoxFuture, BoxedHandler, Endpoint};
use crate::protocol::ProtocolFactory;
use crate::request::Request;
use crate::response::IntoResponse;

/// Name the protocol is registered under by default.
pub const PROTOCOL_NAME: &str = "jwt";

const BEARER_PREFIX: &str = "Bearer ";

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims of a verified token: claim name → arbitrary JSON value.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// The claims as a JSON object.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Token verification failures.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("missing authorization header")]
    MissingHeader,

    #[error("authorization header is not valid UTF-8")]
    InvalidHeader,

    /// The token is signed with something other than HMAC.
    #[error("unexpected signing method: {0:?}")]
    InvalidSigningMethod(Algorithm),

    /// Bad structure, bad signature, unknown algorithm or expired.
    #[error("invalid token: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),
}

impl From<JwtError> for Rejection {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::MissingHeader => Rejection::MissingCredential,
            other => Rejection::InvalidCredential(other.to_string()),
        }
    }
}

/// HMAC token verifier with a cached decoding key.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &Secret) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        // `exp` and `nbf` are checked when present, never required.
        validation.set_required_spec_claims::<&str>(&[]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose().as_bytes()),
            validation,
        }
    }

    /// Verifies `token` (with or without a leading `Bearer `) and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let token = token.strip_prefix(BEARER_PREFIX).unwrap_or(token);

        let header = decode_header(token)?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(JwtError::InvalidSigningMethod(header.alg));
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

/// Factory for the `jwt` protocol.
#[derive(Clone)]
pub struct JwtProtocol {
    verifier: Arc<JwtVerifier>,
}

impl JwtProtocol {
    pub fn new(secret: &Secret) -> Self {
        Self { verifier: Arc::new(JwtVerifier::new(secret)) }
    }
}

impl ProtocolFactory for JwtProtocol {
    fn build(&self, next: BoxedHandler, require_auth: bool) -> BoxedHandler {
        Arc::new(JwtMiddleware {
            next,
            require_auth,
            verifier: Arc::clone(&self.verifier),
        })
    }
}

struct JwtMiddleware {
    next: BoxedHandler,
    require_auth: bool,
    verifier: Arc<JwtVerifier>,
}

impl JwtMiddleware {
    /// `Ok(None)` means "no credential, and none needed".
    fn authenticate(&self, req: &Request) -> Result<Option<Claims>, JwtError> {
        let header = match req.headers().get(AUTHORIZATION) {
            Some(value) if !value.is_empty() => value,
            _ if self.require_auth => return Err(JwtError::MissingHeader),
            _ => return Ok(None),
        };
        let token = header.to_str().map_err(|_| JwtError::InvalidHeader)?;
        self.verifier.verify(token).map(Some)
    }
}

impl Endpoint for JwtMiddleware {
    fn call(&self, mut req: Request) -> BoxFuture {
        // CORS preflight is never challenged.
        if req.method() == Method::OPTIONS {
            return self.next.call(req);
        }

        match self.authenticate(&req) {
            Ok(Some(claims)) => {
                debug!(url = %req.uri(), method = %req.method(), claims = claims.as_map().len(), "token verified");
                req.extensions_mut().insert(claims);
                self.next.call(req)
            }
            Ok(None) => self.next.call(req),
            Err(err) => {
                warn!(url = %req.uri(), method = %req.method(), error = %err, "authentication failed");
                let res = Rejection::from(err).into_response();
                Box::pin(async move { res })
            }
        }
    }
}
