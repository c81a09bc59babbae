//! Client configuration.

use std::time::Duration;

use crate::consts::{
    DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL, ENV_API_KEY, ENV_ENDPOINT, ENV_SECRET,
};

/// How async jobs are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before each poll.
    pub interval: Duration,
    /// Pending polls allowed before giving up. `None` polls forever.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

/// Everything a [`CloudStack`](crate::CloudStack) client needs.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API URL, e.g. `https://cloud.example.com/client/api`.
    pub endpoint: String,
    pub api_key: String,
    pub secret: String,
    pub page_size: u32,
    pub poll: PollPolicy,
}

impl ClientConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            secret: secret.into(),
            page_size: DEFAULT_PAGE_SIZE,
            poll: PollPolicy::default(),
        }
    }

    /// Read endpoint, key and secret from `CLOUDSTACK_ENDPOINT`,
    /// `CLOUDSTACK_API_KEY` and `CLOUDSTACK_SECRET`. `None` unless all three
    /// are set and non-empty.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Some(Self::new(var(ENV_ENDPOINT)?, var(ENV_API_KEY)?, var(ENV_SECRET)?))
    }

    /// Page size is clamped to at least one item.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll.interval = interval;
        self
    }

    /// A cap, when given, is clamped to at least one poll.
    pub fn with_max_poll_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.poll.max_attempts = max_attempts.map(|max| max.max(1));
        self
    }
}

// Keep the secret out of logs and panics.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .field("page_size", &self.page_size)
            .field("poll", &self.poll)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("http://localhost:8080/client/api", "key", "secret")
    }

    #[test]
    fn defaults() {
        let config = config();
        assert_eq!(config.page_size, 500);
        assert_eq!(config.poll.interval, Duration::from_secs(2));
        assert_eq!(config.poll.max_attempts, None);
    }

    #[test]
    fn builders_override_defaults() {
        let config = config()
            .with_page_size(50)
            .with_poll_interval(Duration::ZERO)
            .with_max_poll_attempts(Some(3));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.poll.interval, Duration::ZERO);
        assert_eq!(config.poll.max_attempts, Some(3));
    }

    #[test]
    fn zero_page_size_is_clamped() {
        assert_eq!(config().with_page_size(0).page_size, 1);
    }

    #[test]
    fn zero_poll_cap_is_clamped() {
        let config = config().with_max_poll_attempts(Some(0));
        assert_eq!(config.poll.max_attempts, Some(1));
    }

    #[test]
    fn debug_redacts_secret() {
        let printed = format!("{:?}", config());
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("\"secret\""));
    }
}
