//! Token endpoint client.

use super::{Token, TokenResponse};
use crate::error::Result;
use crate::session::OAuthSession;
use reqwest::Client;
use std::future::Future;
use tracing::{debug, info, warn};
use url::Url;

/// The two grants the flow needs from a token endpoint.
pub trait TokenGrant {
    /// Exchanges an authorization code for tokens.
    fn exchange_code(
        &self,
        session: &OAuthSession,
        code: &str,
    ) -> impl Future<Output = Result<Token>> + Send;

    /// Exchanges a refresh token for a new access token.
    fn refresh(
        &self,
        session: &OAuthSession,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Token>> + Send;
}

/// HTTP client for the provider's token endpoint.
///
/// Requests are form-encoded POSTs; responses are decoded into
/// [`TokenResponse`] and validated into a [`Token`]. Nothing is retried.
#[derive(Debug, Clone, Default)]
pub struct TokenClient {
    http_client: Client,
}

impl TokenClient {
    /// Creates a client with default HTTP settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client sharing an existing HTTP client.
    #[must_use]
    pub const fn from_client(http_client: Client) -> Self {
        Self { http_client }
    }

    async fn post_grant(&self, token_url: &Url, params: &[(&str, &str)]) -> Result<Token> {
        let response = self
            .http_client
            .post(token_url.clone())
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "token endpoint responded");

        let token_response: TokenResponse = serde_json::from_str(&body).inspect_err(|e| {
            warn!(%status, error = %e, "token endpoint returned undecodable body");
        })?;

        Token::from_response(token_response)
    }
}

impl TokenGrant for TokenClient {
    async fn exchange_code(&self, session: &OAuthSession, code: &str) -> Result<Token> {
        let params = [
            ("client_id", session.client_id()),
            ("client_secret", session.client_secret()),
            ("redirect_uri", session.redirect_uri()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];

        let token = self.post_grant(session.token_url(), &params).await?;
        info!(access_token = %token.access_token, "Received new token");
        Ok(token)
    }

    async fn refresh(&self, session: &OAuthSession, refresh_token: &str) -> Result<Token> {
        info!("Refreshing token");

        let params = [
            ("client_id", session.client_id()),
            ("client_secret", session.client_secret()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self.post_grant(session.token_url(), &params).await?;
        info!(access_token = %token.access_token, "Received new token");
        Ok(token)
    }
}
