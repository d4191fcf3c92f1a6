//! Client construction settings.

use std::time::Duration;

/// Base URL used when none is given.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Settings for `PollyClient::from_config`.
///
/// `timeout` is `None` by default, so requests block until the server
/// answers or the connection fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
