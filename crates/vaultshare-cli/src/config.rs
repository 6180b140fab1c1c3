//! CLI configuration

use std::fmt;
use std::time::Duration;
use vaultshare_client::ClientConfig;

/// Settings shared by every subcommand
#[derive(Clone)]
pub struct CliConfig {
    /// API base URL
    pub endpoint: String,
    /// Account name
    pub username: Option<String>,
    /// Account password
    pub password: Option<String>,
    /// Current authenticator code
    pub mfa_code: Option<String>,
    /// Per-request deadline in seconds
    pub timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            endpoint: ClientConfig::default().endpoint,
            username: None,
            password: None,
            mfa_code: None,
            timeout_secs: 30,
        }
    }
}

impl CliConfig {
    /// Client settings derived from this config
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.endpoint.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_user_agent(format!("vaultshare-cli/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Username and password, or an error naming what is missing
    pub fn credentials(&self) -> anyhow::Result<(&str, &str)> {
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("username required (--username or VAULTSHARE_USERNAME)"))?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("password required (--password or VAULTSHARE_PASSWORD)"))?;
        Ok((username, password))
    }
}

impl fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .field("has_mfa_code", &self.mfa_code.is_some())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
