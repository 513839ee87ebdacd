//! Structured request/response logging.
//!
//! Two independent `debug` events per request:
//!
//! | Event | When | Fields |
//! |---|---|---|
//! | `Query content` | before dispatch | `method`, `url` (+ `content`, `header`) |
//! | `Query response` | after dispatch | `method`, `url`, `execution_time`, `status` (+ `content`, `header`) |
//!
//! Bodies and headers are only added when [`LogConfig::content`] is on.
//! Requests to the probe path produce neither event, so liveness checks do
//! not flood the logs.

use std::time::Instant;

use tracing::debug;

use crate::capture::CapturedResponse;
use crate::config::LogConfig;
use crate::request::{Request, RequestHead};

#[derive(Clone, Debug, Default)]
pub struct RequestLogger {
    log: LogConfig,
    probe_path: Option<String>,
}

impl RequestLogger {
    pub fn new(log: LogConfig, probe_path: Option<String>) -> Self {
        Self { log, probe_path }
    }

    fn exempt(&self, path: &str) -> bool {
        self.probe_path.as_deref() == Some(path)
    }

    /// Pre-dispatch event.
    pub fn query(&self, req: &Request) {
        if !self.log.query || self.exempt(req.path()) {
            return;
        }
        if self.log.content {
            debug!(
                method = %req.method(),
                url = %req.uri(),
                content = %String::from_utf8_lossy(req.body()),
                header = ?req.headers(),
                "Query content"
            );
        } else {
            debug!(method = %req.method(), url = %req.uri(), "Query content");
        }
    }

    /// Post-dispatch event.
    pub fn response(&self, req: &RequestHead, started: Instant, capture: &CapturedResponse<'_>) {
        if !self.log.response || self.exempt(req.path()) {
            return;
        }
        let execution_time = started.elapsed();
        if self.log.content {
            debug!(
                method = %req.method,
                url = req.path(),
                ?execution_time,
                status = capture.status.as_u16(),
                content = %capture.content_lossy(),
                header = ?capture.headers,
                "Query response"
            );
        } else {
            debug!(
                method = %req.method,
                url = req.path(),
                ?execution_time,
                status = capture.status.as_u16(),
                "Query response"
            );
        }
    }
}
