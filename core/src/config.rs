//! Client configuration.

use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_CORRELATION_HEADER: &str = "TrackingID";

/// Where and how the client talks to the API.
///
/// ```
/// use std::time::Duration;
/// use restlink_core::ClientConfig;
///
/// let config = ClientConfig::new("https://api.example.com/")
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.base_url, "https://api.example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base address every request path is appended to, without trailing `/`.
    pub base_url: String,
    /// Whole-call timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Header carrying the per-request correlation id.
    pub correlation_header: String,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Some(Duration::from_secs(30)),
            correlation_header: DEFAULT_CORRELATION_HEADER.to_string(),
            user_agent: format!("restlink/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Reads `RESTLINK_BASE_URL` and, optionally, `RESTLINK_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("RESTLINK_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config("RESTLINK_BASE_URL is not set".to_string()))?;
        let mut config = Self::new(base_url.trim());
        if let Some(raw) = lookup("RESTLINK_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("RESTLINK_TIMEOUT_SECS is not a number: {raw}"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_correlation_header(mut self, name: impl Into<String>) -> Self {
        self.correlation_header = name.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
