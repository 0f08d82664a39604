//! HTTP transport configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// A required configuration field is missing.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A timeout value is out of acceptable range.
    #[error("invalid timeout: {0:?}")]
    InvalidTimeout(Duration),
}

/// Connection pool and client settings for [`HttpTransport`](crate::HttpTransport).
///
/// Per-request deadlines come from each request's own timeout; the settings
/// here only bound connection setup and pooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Idle connection timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// TCP keepalive interval
    pub tcp_keepalive: Option<Duration>,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 64,
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: Some(Duration::from_secs(60)),
            user_agent: format!("qpsbench/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpTransportConfig {
    /// Create config with custom connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Create config with custom pool size.
    pub fn with_pool_max_idle(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Create config with a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.user_agent.is_empty() {
            return Err(ConfigValidationError::MissingField("user_agent"));
        }

        // 10ms to 5m
        if self.connect_timeout < Duration::from_millis(10)
            || self.connect_timeout > Duration::from_secs(300)
        {
            return Err(ConfigValidationError::InvalidTimeout(self.connect_timeout));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HttpTransportConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.user_agent.starts_with("qpsbench/"));
    }

    #[test]
    fn test_builder_methods() {
        let config = HttpTransportConfig::default()
            .with_connect_timeout(Duration::from_secs(2))
            .with_pool_max_idle(8)
            .with_user_agent("probe");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.pool_max_idle_per_host, 8);
        assert_eq!(config.user_agent, "probe");
    }

    #[test]
    fn test_invalid_connect_timeout() {
        let config = HttpTransportConfig::default().with_connect_timeout(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::InvalidTimeout(Duration::ZERO))
        );
    }

    #[test]
    fn test_missing_user_agent() {
        let config = HttpTransportConfig::default().with_user_agent("");
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::MissingField("user_agent"))
        );
    }
}
