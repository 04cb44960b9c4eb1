//! Client configuration

use crate::error::{CherryError, Result};

/// Default Cherry Servers API endpoint
pub const CHERRY_API_BASE: &str = "https://api.cherryservers.com/v1/";

const USER_AGENT: &str = concat!("cherryflow/", env!("CARGO_PKG_VERSION"));

/// Configuration for the Cherry Servers API client
#[derive(Clone)]
pub struct ClientConfig {
    pub auth_token: String,
    /// Always ends with `/`
    pub base_url: String,
    pub user_agent: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("auth_token", &"***")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            base_url: CHERRY_API_BASE.to_string(),
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Point the client at another API root (mock servers, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Create ClientConfig from environment variables
    ///
    /// Reads `CHERRY_AUTH_TOKEN`, falling back to `CHERRY_AUTH_KEY`, and an
    /// optional `CHERRY_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let auth_token = std::env::var("CHERRY_AUTH_TOKEN")
            .or_else(|_| std::env::var("CHERRY_AUTH_KEY"))
            .map_err(|_| CherryError::MissingEnvVar("CHERRY_AUTH_TOKEN".to_string()))?;

        let config = Self::new(auth_token);
        match std::env::var("CHERRY_BASE_URL") {
            Ok(base_url) if !base_url.is_empty() => Ok(config.with_base_url(base_url)),
            _ => Ok(config),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.auth_token.trim().is_empty() {
            return Err(CherryError::InvalidConfig("auth token is empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(CherryError::InvalidConfig(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        Ok(())
    }
}
