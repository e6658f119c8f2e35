//! Account-information collaborator.
//!
//! The flow only needs "accept a bearer token, return the account"; the body
//! is handed back verbatim whatever the status. Only failing to reach the
//! endpoint is an error.

use crate::error::Result;
use reqwest::Client;
use std::future::Future;
use tracing::debug;
use url::Url;

/// Fetches account information with a bearer token.
pub trait AccountApi {
    /// Returns the account representation for `access_token`.
    fn fetch_account(&self, access_token: &str) -> impl Future<Output = Result<String>> + Send;
}

/// HTTP implementation of [`AccountApi`].
#[derive(Debug, Clone)]
pub struct AccountClient {
    url: Url,
    http_client: Client,
}

impl AccountClient {
    /// Creates a client for the given account endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not a valid URL.
    pub fn new(url: impl AsRef<str>, http_client: Client) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url.as_ref())?,
            http_client,
        })
    }

    /// Account endpoint.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl AccountApi for AccountClient {
    async fn fetch_account(&self, access_token: &str) -> Result<String> {
        let response = self
            .http_client
            .get(self.url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(url = %self.url, %status, bytes = body.len(), "account information received");
        Ok(body)
    }
}
