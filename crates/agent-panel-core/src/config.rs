//! Endpoint and timing configuration for the panel.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Fixed delay between realtime channel reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default timeout for request/response calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default header carrying the session id.
pub const DEFAULT_SESSION_HEADER: &str = "X-Session-Id";

const ENV_API_URL: &str = "AGENT_PANEL_API_URL";
const ENV_REALTIME_URL: &str = "AGENT_PANEL_REALTIME_URL";
const ENV_RECONNECT_SECS: &str = "AGENT_PANEL_RECONNECT_SECS";
const ENV_TIMEOUT_SECS: &str = "AGENT_PANEL_TIMEOUT_SECS";
const ENV_SESSION_HEADER: &str = "AGENT_PANEL_SESSION_HEADER";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where the agent backend lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Base URL of the request/response API.
    pub api_base_url: String,
    /// URL of the persistent realtime channel.
    pub realtime_url: String,
    /// Delay before each realtime reconnection attempt.
    #[serde(rename = "reconnect_delay_secs", deserialize_with = "secs")]
    pub reconnect_delay: Duration,
    /// Timeout applied to each request/response call.
    #[serde(rename = "request_timeout_secs", deserialize_with = "secs")]
    pub request_timeout: Duration,
    /// Header that carries the session id.
    pub session_header: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/".to_string(),
            realtime_url: "ws://localhost:8000/ws".to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session_header: DEFAULT_SESSION_HEADER.to_string(),
        }
    }
}

impl PanelConfig {
    /// Create a config for the given endpoints with default timings.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, realtime_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            realtime_url: realtime_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_session_header(mut self, header: impl Into<String>) -> Self {
        self.session_header = header.into();
        self
    }

    /// Build a config from `AGENT_PANEL_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    /// Returns error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_REALTIME_URL) {
            config.realtime_url = url;
        }
        if let Some(raw) = lookup(ENV_RECONNECT_SECS) {
            config = config.with_reconnect_delay(parse_secs(ENV_RECONNECT_SECS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config = config.with_request_timeout(parse_secs(ENV_TIMEOUT_SECS, &raw)?);
        }
        if let Some(header) = lookup(ENV_SESSION_HEADER) {
            config = config.with_session_header(header);
        }

        Ok(config)
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        })
}

fn secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}
