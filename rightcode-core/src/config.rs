//! Client configuration.
//!
//! Values come from the caller or from the environment (optionally seeded
//! from a `.env` file). No timeouts are applied unless configured.

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Variable holding the backend base URL.
pub const ENV_BASE_URL: &str = "RIGHTCODE_API_URL";
/// Variable holding the connect timeout, in humantime syntax.
pub const ENV_CONNECT_TIMEOUT: &str = "RIGHTCODE_CONNECT_TIMEOUT";
/// Variable holding the one-shot request timeout.
pub const ENV_REQUEST_TIMEOUT: &str = "RIGHTCODE_REQUEST_TIMEOUT";

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL does not parse or cannot have paths appended.
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A timeout variable is not a valid duration.
    #[error("invalid duration in {var}: {source}")]
    InvalidDuration {
        /// Offending variable.
        var: &'static str,
        /// Parse failure.
        #[source]
        source: humantime::DurationError,
    },

    /// A `.env` file exists but could not be read.
    #[error("failed to load .env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Connection settings for the task backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend root, e.g. `http://127.0.0.1:8000`.
    pub base_url: Url,
    /// Applied when establishing a connection, for streams as well.
    pub connect_timeout: Option<Duration>,
    /// Applied to one-shot requests only; streams stay open until the
    /// server closes them.
    pub request_timeout: Option<Duration>,
    /// Sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Config for `base_url` with no timeouts.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            connect_timeout: None,
            request_timeout: None,
            user_agent: default_user_agent(),
        })
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the one-shot request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build a config from `RIGHTCODE_*` variables, loading `.env` first
    /// when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err.into()),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(base_url.trim())?;
        config.connect_timeout =
            parse_duration_var(ENV_CONNECT_TIMEOUT, lookup(ENV_CONNECT_TIMEOUT))?;
        config.request_timeout =
            parse_duration_var(ENV_REQUEST_TIMEOUT, lookup(ENV_REQUEST_TIMEOUT))?;
        Ok(config)
    }
}

fn default_user_agent() -> String {
    format!("rightcode-core/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "URL cannot be used as a base".to_string(),
        });
    }

    Ok(url)
}

fn parse_duration_var(
    var: &'static str,
    value: Option<String>,
) -> Result<Option<Duration>, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => humantime::parse_duration(raw)
            .map(Some)
            .map_err(|source| ConfigError::InvalidDuration { var, source }),
    }
}
