//! Process-wide configuration.
//!
//! The router never reads the environment on its own; everything it needs
//! arrives through [`Config`], which can be parsed from TOML, read from
//! environment variables, or built in code:
//!
//! ```toml
//! probe_path = "/healthz"
//! jwt_secret = "change-me"
//!
//! [log]
//! query = true
//! response = true
//! content = false
//! ```

use std::{env, fmt, fs, path::Path};

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

/// A string that is wiped from memory on drop and never printed.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// Verbosity toggles for the request logger. All off by default.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Log method and URI before dispatch.
    pub query: bool,
    /// Log method, path, status and latency after dispatch.
    pub response: bool,
    /// Add bodies and headers to both events. Can be huge.
    pub content: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Liveness probe path. Gets a built-in handler and is never logged.
    pub probe_path: Option<String>,
    /// Shared HMAC secret. When set, the `jwt` protocol is registered by default.
    pub jwt_secret: Option<Secret>,
    pub log: LogConfig,
}

impl Config {
    /// Parses a TOML document and validates it.
    pub fn from_toml(toml_str: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Reads `PROBE_PATH`, `JWT_SECRET`, `LOG_QUERY`, `LOG_RESPONSE` and
    /// `LOG_CONTENT`. Unset or empty variables keep their defaults; toggles
    /// accept `1`, `true`, `yes` and `on`.
    pub fn from_env() -> Result<Self, Error> {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());
        let flag = |name: &str| {
            var(name).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        };

        let config = Self {
            probe_path: var("PROBE_PATH"),
            jwt_secret: var("JWT_SECRET").map(Secret::new),
            log: LogConfig {
                query: flag("LOG_QUERY"),
                response: flag("LOG_RESPONSE"),
                content: flag("LOG_CONTENT"),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(path) = &self.probe_path
            && !path.starts_with('/')
        {
            return Err(Error::ConfigInvalid(format!("probe_path `{path}` must start with `/`")));
        }
        if self.jwt_secret.as_ref().is_some_and(Secret::is_empty) {
            return Err(Error::ConfigInvalid("jwt_secret must not be empty".into()));
        }
        Ok(())
    }

    pub fn with_probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = Some(path.into());
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(Secret::new(secret));
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}
