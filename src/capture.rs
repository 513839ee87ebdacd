//! Observation of the response a request produced.
//!
//! Handlers return whole [`Response`] values, so the capture sees the
//! complete body rather than only the last chunk written to a stream.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::response::Response;

/// Status, body and headers of a finished response.
///
/// Borrowed from the response that is about to be sent; nothing is copied.
#[derive(Clone, Copy, Debug)]
pub struct CapturedResponse<'a> {
    pub status: StatusCode,
    pub content: &'a Bytes,
    pub headers: &'a HeaderMap,
}

impl<'a> CapturedResponse<'a> {
    pub fn observe(res: &'a Response) -> Self {
        Self { status: res.status_code(), content: res.body(), headers: res.headers() }
    }

    /// Body as text for log fields. Invalid UTF-8 is replaced, not rejected.
    pub fn content_lossy(&self) -> std::borrow::Cow<'a, str> {
        String::from_utf8_lossy(self.content)
    }
}
