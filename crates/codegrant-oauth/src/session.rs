//! Per-flow session parameters.

use crate::config::OAuthConfig;
use crate::error::Result;
use url::Url;
use uuid::Uuid;

/// Immutable parameters of one authorization code flow.
///
/// The CSRF state is generated once when the session is created and never
/// changes afterwards.
#[derive(Debug, Clone)]
pub struct OAuthSession {
    auth_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
    listen_port: u16,
    csrf_state: String,
}

impl OAuthSession {
    /// Creates a session with a fresh random CSRF state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &OAuthConfig) -> Result<Self> {
        Self::with_state(config, Uuid::new_v4().to_string())
    }

    /// Creates a session with a caller-chosen CSRF state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_state(config: &OAuthConfig, csrf_state: impl Into<String>) -> Result<Self> {
        config.validate()?;

        let origin = origin(&config.base_url);
        Ok(Self {
            auth_url: Url::parse(&format!("{origin}{}", config.auth_endpoint))?,
            token_url: Url::parse(&format!("{origin}{}", config.token_endpoint))?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.oauth_scope.clone(),
            listen_port: config.port,
            csrf_state: csrf_state.into(),
        })
    }

    /// Authorization endpoint, without query.
    #[must_use]
    pub const fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Token endpoint.
    #[must_use]
    pub const fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Redirect URI sent with the authorization and code exchange requests.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Requested scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Port the redirect listener binds to.
    #[must_use]
    pub const fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// CSRF state round-tripped through the redirect.
    #[must_use]
    pub fn csrf_state(&self) -> &str {
        &self.csrf_state
    }

    /// Returns whether `state` is exactly this session's CSRF state.
    #[must_use]
    pub fn state_matches(&self, state: Option<&str>) -> bool {
        state == Some(self.csrf_state.as_str())
    }
}

/// Bare hosts get `https://`; explicit origins are kept.
fn origin(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.starts_with("https://") || base.starts_with("http://") {
        base.to_string()
    } else {
        format!("https://{base}")
    }
}
