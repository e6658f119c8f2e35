//! Flow configuration.
//!
//! [`OAuthConfig`] is the structured options record the flow consumes. It is
//! deserialized by the caller from whatever source it likes; this crate never
//! reads configuration files itself.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default account-information endpoint.
pub const DEFAULT_ACCOUNT_URL: &str = "https://api.sipgate.com/v2/account";

/// Options for one authorization code flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Provider host (e.g. `login.sipgate.com`), or a full origin with scheme.
    pub base_url: String,
    /// Path of the authorization endpoint.
    pub auth_endpoint: String,
    /// Path of the token endpoint.
    pub token_endpoint: String,
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Space-separated scopes to request.
    pub oauth_scope: String,
    /// Local port of the redirect listener.
    pub port: u16,
    /// Account-information endpoint queried with the bearer token.
    #[serde(default = "default_account_url")]
    pub account_url: String,
    /// Upper bound on waiting for the provider's redirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_timeout_secs: Option<u64>,
    /// Timeout applied to every outbound HTTP request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_timeout_secs: Option<u64>,
    /// Whether to launch the system browser with the authorization URL.
    #[serde(default)]
    pub open_browser: bool,
}

fn default_account_url() -> String {
    DEFAULT_ACCOUNT_URL.to_string()
}

impl OAuthConfig {
    /// Validates that required values are present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("base_url", &self.base_url),
            ("auth_endpoint", &self.auth_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
            ("oauth_scope", &self.oauth_scope),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{key} is empty")));
            }
        }

        for (key, value) in [
            ("auth_endpoint", &self.auth_endpoint),
            ("token_endpoint", &self.token_endpoint),
        ] {
            if !value.starts_with('/') {
                return Err(Error::InvalidConfig(format!(
                    "{key} must be an absolute path, got {value:?}"
                )));
            }
        }

        Url::parse(&self.redirect_uri)
            .map_err(|e| Error::InvalidConfig(format!("redirect_uri: {e}")))?;
        Url::parse(&self.account_url)
            .map_err(|e| Error::InvalidConfig(format!("account_url: {e}")))?;

        Ok(())
    }

    /// Returns the callback wait bound, if configured.
    #[must_use]
    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the outbound HTTP timeout, if configured.
    #[must_use]
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}
