//! Token endpoint wire types and the validated [`Token`].

mod client;

pub use client::{TokenClient, TokenGrant};

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// `OAuth2` access token with metadata.
///
/// Only ever built from a successful token endpoint response, so holding a
/// `Token` means the provider issued an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Access token string.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Refresh token for obtaining new access tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scope granted by authorization server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Access token lifetime in seconds, as sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<String>,
    /// Refresh token lifetime in seconds, as sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<String>,
    /// Provider session identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    /// Provider not-before policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before_policy: Option<String>,
    /// Expiration time, when `expires_in` is numeric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Creates a token with only an access token set.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            refresh_token: None,
            scope: None,
            expires_in: None,
            refresh_expires_in: None,
            session_state: None,
            not_before_policy: None,
            expires_at: None,
        }
    }

    /// Creates a token from a decoded token endpoint response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OAuth`] if the response carries a non-empty `error`,
    /// and [`Error::MalformedResponse`] if it carries no access token either.
    pub fn from_response(response: TokenResponse) -> Result<Self> {
        if let Some(error) = response.error.filter(|e| !e.is_empty()) {
            return Err(Error::oauth_error(
                error,
                response.error_description.unwrap_or_default(),
            ));
        }

        let access_token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::MalformedResponse("neither access_token nor error present".to_string())
            })?;

        let expires_at = response
            .expires_in
            .as_deref()
            .and_then(|secs| secs.trim().parse::<i64>().ok())
            .map(|secs| Utc::now() + Duration::seconds(secs));

        Ok(Self {
            access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            scope: response.scope,
            expires_in: response.expires_in,
            refresh_expires_in: response.refresh_expires_in,
            session_state: response.session_state,
            not_before_policy: response.not_before_policy,
            expires_at,
        })
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Returns the refresh token if available.
    ///
    /// # Errors
    ///
    /// Returns an error if no refresh token is available.
    pub fn refresh_token(&self) -> Result<&str> {
        self.refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(Error::NoRefreshToken)
    }
}

/// Token response from the `OAuth2` server, exactly as sent.
///
/// Every field is optional; absent fields stay `None` and unknown fields are
/// ignored. The wire names are used for serialization, the camelCase names
/// are accepted as aliases when decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Access token.
    #[serde(alias = "accessToken", default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Refresh token.
    #[serde(alias = "refreshToken", default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token type.
    #[serde(alias = "tokenType", default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Scope.
    #[serde(default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Expires in seconds.
    #[serde(alias = "expiresIn", default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<String>,
    /// Refresh token expires in seconds.
    #[serde(
        alias = "refreshExpiresIn",
        default,
        deserialize_with = "lenient_string"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<String>,
    /// Provider session state.
    #[serde(alias = "sessionState", default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    /// Not-before policy.
    #[serde(
        rename = "not-before-policy",
        alias = "notBeforePolicy",
        default,
        deserialize_with = "lenient_string"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before_policy: Option<String>,
    /// Error code.
    #[serde(default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error description.
    #[serde(
        alias = "errorDescription",
        default,
        deserialize_with = "lenient_string"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Accepts strings, numbers and booleans; numbers keep their decimal text.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}
