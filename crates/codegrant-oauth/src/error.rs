//! Error types for the authorization code flow.

use std::io;
use std::time::Duration;

/// Result type alias for `OAuth2` flow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure categories reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The callback `state` did not match the session's CSRF state.
    StateMismatch,
    /// The provider answered with an error, or with nothing usable.
    ProviderError,
    /// The provider or the local listener could not be reached or answered.
    Transport,
    /// A response body was not the JSON we expected.
    Decode,
    /// The local callback port could not be bound.
    ListenerBind,
    /// The options record is unusable.
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StateMismatch => "StateMismatch",
            Self::ProviderError => "OAuthProviderError",
            Self::Transport => "TransportError",
            Self::Decode => "DecodeError",
            Self::ListenerBind => "ListenerBindError",
            Self::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

/// `OAuth2` flow errors.
///
/// Every variant is terminal for a flow; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Callback state differs from the state sent with the authorization request.
    #[error("state mismatch: expected {expected}, received {}", .received.as_deref().unwrap_or("<none>"))]
    StateMismatch {
        /// State generated for this session.
        expected: String,
        /// State carried by the callback, if any.
        received: Option<String>,
    },

    /// `OAuth2` error returned by the token endpoint.
    #[error("OAuth2 error: {error} - {description}")]
    OAuth {
        /// Error code (e.g., `invalid_grant`).
        error: String,
        /// Human-readable description.
        description: String,
    },

    /// The provider redirected back with an error instead of a code.
    #[error("authorization denied: {error} - {description}")]
    AuthorizationDenied {
        /// Error code (e.g., `access_denied`).
        error: String,
        /// Human-readable description, empty if the provider sent none.
        description: String,
    },

    /// Callback carried neither a code nor an error.
    #[error("callback did not contain an authorization code")]
    MissingCode,

    /// Token response did not include a refresh token.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Token response had neither an access token nor an error.
    #[error("Invalid token response: {0}")]
    MalformedResponse(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Local callback port could not be bound.
    #[error("cannot bind callback listener on port {port}: {source}")]
    ListenerBind {
        /// Port that was requested.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The callback listener failed after binding.
    #[error("callback listener error: {0}")]
    Listener(#[from] io::Error),

    /// No callback arrived in time.
    #[error("no callback received within {0:?}")]
    CallbackTimeout(Duration),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Creates an OAuth error from error code and description.
    #[must_use]
    pub fn oauth_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuth {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Returns the failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::StateMismatch { .. } => ErrorKind::StateMismatch,
            Self::OAuth { .. }
            | Self::AuthorizationDenied { .. }
            | Self::MissingCode
            | Self::NoRefreshToken
            | Self::MalformedResponse(_) => ErrorKind::ProviderError,
            Self::Transport(_) | Self::Listener(_) | Self::CallbackTimeout(_) => {
                ErrorKind::Transport
            }
            Self::Decode(_) => ErrorKind::Decode,
            Self::ListenerBind { .. } => ErrorKind::ListenerBind,
            Self::InvalidConfig(_) | Self::Url(_) => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mismatch_message() {
        let err = Error::StateMismatch {
            expected: "S".to_string(),
            received: Some("WRONG".to_string()),
        };
        assert_eq!(err.to_string(), "state mismatch: expected S, received WRONG");

        let err = Error::StateMismatch {
            expected: "S".to_string(),
            received: None,
        };
        assert!(err.to_string().ends_with("received <none>"));
        assert_eq!(err.kind(), ErrorKind::StateMismatch);
    }

    #[test]
    fn test_oauth_error_kind() {
        let err = Error::oauth_error("invalid_grant", "Code already used");
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert_eq!(err.kind().to_string(), "OAuthProviderError");
        assert!(err.to_string().contains("Code already used"));
    }

    #[test]
    fn test_listener_kinds() {
        let bind = Error::ListenerBind {
            port: 8080,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(bind.kind(), ErrorKind::ListenerBind);
        assert_eq!(
            Error::CallbackTimeout(Duration::from_secs(5)).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn test_callback_timeout_keeps_sub_second_limit() {
        let err = Error::CallbackTimeout(Duration::from_millis(100));
        assert_eq!(err.to_string(), "no callback received within 100ms");
    }
}
