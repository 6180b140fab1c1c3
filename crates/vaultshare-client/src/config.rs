//! Client configuration

use std::time::Duration;

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API base URL, e.g. `http://localhost:8000/api/v1`
    pub endpoint: String,
    /// Deadline for every backend call; exceeding it is `NetworkUnavailable`
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/v1".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("vaultshare-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Base URL with exactly one trailing slash, ready for relative joins
    pub fn base_url(&self) -> String {
        format!("{}/", self.endpoint.trim_end_matches('/'))
    }
}
