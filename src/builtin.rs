//! Handlers every secure router carries.
//!
//! | Path | Answer |
//! |---|---|
//! | `/robots.txt` | disallow everything |
//! | `/favicon.ico` | a blank 16×16 icon, so browsers stop asking |
//! | probe path (configured) | `{"ping":"pong"}` |
//!
//! The probe path is also exempt from request logging.

use crate::{ContentType, Request, Response};

const ROBOTS: &str = "User-agent: *\nDisallow: /";

static FAVICON: &[u8] = include_bytes!("../assets/favicon.ico");

pub async fn robots(_req: Request) -> Response {
    Response::text(ROBOTS)
}

pub async fn favicon(_req: Request) -> Response {
    Response::builder().bytes(ContentType::Icon, FAVICON)
}

/// Liveness probe. If the process can answer HTTP at all, it is alive.
pub async fn probe(_req: Request) -> Response {
    Response::json(r#"{"ping":"pong"}"#)
}
