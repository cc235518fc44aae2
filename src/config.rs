//! Client configuration.
//!
//! All values are consumed once at client construction; nothing re-reads the
//! environment afterward.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::stream::client::DEFAULT_RECONNECT_DELAY;

/// Default tuning used when a value is not set explicitly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConfigDefaults;

impl ConfigDefaults {
    pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const RETRY_ATTEMPTS: usize = 3;
    pub const BACKOFF_BASE: Duration = Duration::from_secs(1);
    pub const RECONNECT_DELAY: Duration = DEFAULT_RECONNECT_DELAY;
    pub const STREAM_ENABLED: bool = true;
}

/// Connection and retry settings for a [`GridClient`](crate::client::GridClient).
#[derive(Clone, Debug)]
pub struct Config {
    /// REST base URL, e.g. `https://ops.example.io`.
    pub api_url: String,
    /// Stream URL, e.g. `wss://ops.example.io/ws`.
    pub ws_url: String,
    /// Upper bound on each individual REST attempt.
    pub attempt_timeout: Duration,
    /// Additional attempts after the first failure.
    pub retry_attempts: usize,
    /// First backoff delay; doubles per retry.
    pub backoff_base: Duration,
    /// Fixed delay between stream reconnect attempts.
    pub reconnect_delay: Duration,
    /// Whether `init()` opens the stream connection.
    pub stream_enabled: bool,
}

impl Config {
    /// Creates a config with default tuning for the given endpoints.
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: ws_url.into(),
            attempt_timeout: ConfigDefaults::ATTEMPT_TIMEOUT,
            retry_attempts: ConfigDefaults::RETRY_ATTEMPTS,
            backoff_base: ConfigDefaults::BACKOFF_BASE,
            reconnect_delay: ConfigDefaults::RECONNECT_DELAY,
            stream_enabled: ConfigDefaults::STREAM_ENABLED,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, retries: usize) -> Self {
        self.retry_attempts = retries;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_stream_enabled(mut self, enabled: bool) -> Self {
        self.stream_enabled = enabled;
        self
    }

    /// Builds a config from `GRIDLINK_*` environment variables, loading a
    /// `.env` file first when present.
    ///
    /// `GRIDLINK_API_URL` and `GRIDLINK_WS_URL` are required; the remaining
    /// variables fall back to [`ConfigDefaults`].
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::new(
            require_var("GRIDLINK_API_URL")?,
            require_var("GRIDLINK_WS_URL")?,
        );

        if let Some(ms) = parse_var::<u64>("GRIDLINK_TIMEOUT_MS")? {
            config.attempt_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_var::<usize>("GRIDLINK_RETRY_ATTEMPTS")? {
            config.retry_attempts = retries;
        }
        if let Some(ms) = parse_var::<u64>("GRIDLINK_BACKOFF_MS")? {
            config.backoff_base = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>("GRIDLINK_RECONNECT_MS")? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(raw) = env::var("GRIDLINK_STREAM").ok().filter(|v| !v.is_empty()) {
            config.stream_enabled = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        var: "GRIDLINK_STREAM",
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}

fn require_var(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingVar(var))
}

fn parse_var<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { var, value: raw }),
        _ => Ok(None),
    }
}

/// Errors produced while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Config, ConfigDefaults, ConfigError};

    #[test]
    fn new_applies_default_tuning() {
        let config = Config::new("http://localhost:8080", "ws://localhost:8081/ws");
        assert_eq!(config.attempt_timeout, ConfigDefaults::ATTEMPT_TIMEOUT);
        assert_eq!(config.retry_attempts, ConfigDefaults::RETRY_ATTEMPTS);
        assert_eq!(config.backoff_base, ConfigDefaults::BACKOFF_BASE);
        assert!(config.stream_enabled);
    }

    #[test]
    fn builders_override_single_fields() {
        let config = Config::new("http://localhost:8080", "ws://localhost:8081/ws")
            .with_retry_attempts(1)
            .with_backoff_base(Duration::from_millis(10))
            .with_stream_enabled(false);
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.backoff_base, Duration::from_millis(10));
        assert!(!config.stream_enabled);
    }

    // Environment access is process-global, so the env-driven paths are
    // covered in one test to avoid concurrent test interference.
    #[test]
    fn from_env_reads_and_validates_variables() {
        std::env::set_var("GRIDLINK_API_URL", "http://localhost:9090");
        std::env::set_var("GRIDLINK_WS_URL", "ws://localhost:9091/ws");
        std::env::set_var("GRIDLINK_TIMEOUT_MS", "2500");
        std::env::set_var("GRIDLINK_RETRY_ATTEMPTS", "2");
        std::env::set_var("GRIDLINK_STREAM", "off");

        let config = Config::from_env().expect("config");
        assert_eq!(config.api_url, "http://localhost:9090");
        assert_eq!(config.attempt_timeout, Duration::from_millis(2500));
        assert_eq!(config.retry_attempts, 2);
        assert!(!config.stream_enabled);

        std::env::set_var("GRIDLINK_RETRY_ATTEMPTS", "many");
        let error = Config::from_env().expect_err("invalid retries");
        assert!(matches!(error, ConfigError::InvalidVar { var, .. } if var == "GRIDLINK_RETRY_ATTEMPTS"));

        for var in [
            "GRIDLINK_API_URL",
            "GRIDLINK_WS_URL",
            "GRIDLINK_TIMEOUT_MS",
            "GRIDLINK_RETRY_ATTEMPTS",
            "GRIDLINK_STREAM",
        ] {
            std::env::remove_var(var);
        }

        let error = Config::from_env().expect_err("missing url");
        assert!(matches!(error, ConfigError::MissingVar("GRIDLINK_API_URL")));
    }
}
