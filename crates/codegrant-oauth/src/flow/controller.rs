//! Flow controller: callback validation, code exchange and refresh.

use super::{FlowState, authorization_url};
use crate::account::{AccountApi, AccountClient};
use crate::config::OAuthConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::listener::{CallbackRequest, RedirectListener};
use crate::session::OAuthSession;
use crate::token::{Token, TokenClient, TokenGrant};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Everything a successful flow produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    /// Token from the authorization code exchange.
    pub token: Token,
    /// Account information fetched with `token`.
    pub account: String,
    /// Token from the refresh grant.
    pub refreshed: Token,
    /// Account information fetched with `refreshed`.
    pub refreshed_account: String,
}

/// Drives one authorization code flow from URL to refreshed token.
///
/// Owns the [`OAuthSession`]; the token endpoint and the account
/// collaborator are pluggable so the flow can run without a network.
#[derive(Debug)]
pub struct OAuthFlowController<T = TokenClient, A = AccountClient> {
    session: OAuthSession,
    tokens: T,
    accounts: A,
    callback_timeout: Option<Duration>,
    state: FlowState,
}

impl OAuthFlowController {
    /// Creates a controller with HTTP collaborators for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &OAuthConfig) -> Result<Self> {
        let session = OAuthSession::new(config)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let accounts = AccountClient::new(&config.account_url, http_client.clone())?;
        Ok(
            Self::new(session, TokenClient::from_client(http_client), accounts)
                .with_callback_timeout(config.callback_timeout()),
        )
    }
}

impl<T: TokenGrant, A: AccountApi> OAuthFlowController<T, A> {
    /// Creates a controller from its parts.
    #[must_use]
    pub const fn new(session: OAuthSession, tokens: T, accounts: A) -> Self {
        Self {
            session,
            tokens,
            accounts,
            callback_timeout: None,
            state: FlowState::Init,
        }
    }

    /// Bounds the wait for the provider's redirect.
    #[must_use]
    pub const fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// The session this flow runs with.
    #[must_use]
    pub const fn session(&self) -> &OAuthSession {
        &self.session
    }

    /// Current flow state.
    #[must_use]
    pub const fn state(&self) -> FlowState {
        self.state
    }

    /// Authorization URL for this session.
    #[must_use]
    pub fn authorization_url(&self) -> Url {
        authorization_url(&self.session)
    }

    /// Runs the whole flow.
    ///
    /// Binds the redirect listener, hands the authorization URL to `display`,
    /// waits for the callback and then processes it like
    /// [`handle_callback`](Self::handle_callback).
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the flow; [`state`](Self::state)
    /// reports the matching aborted state.
    pub async fn run<F>(&mut self, display: F) -> Result<FlowOutcome>
    where
        F: FnOnce(&Url),
    {
        let pending = match RedirectListener::bind(self.session.listen_port())
            .await
            .and_then(RedirectListener::listen)
        {
            Ok(pending) => pending,
            Err(e) => return Err(self.abort(e)),
        };

        let url = self.authorization_url();
        info!(%url, listener = %pending.local_addr(), "waiting for authorization");
        display(&url);
        self.transition(FlowState::AwaitingCallback);

        let callback = match pending.wait(self.callback_timeout).await {
            Ok(callback) => callback,
            Err(e) => return Err(self.abort(e)),
        };

        self.handle_callback(callback).await
    }

    /// Validates a callback and runs exchange, account fetch, refresh and
    /// account fetch.
    ///
    /// Nothing is sent to the token endpoint unless the callback's state
    /// matches the session's.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the flow.
    pub async fn handle_callback(&mut self, callback: CallbackRequest) -> Result<FlowOutcome> {
        self.transition(FlowState::Validating);
        let code = match self.validate(callback) {
            Ok(code) => code,
            Err(e) => return Err(self.abort(e)),
        };

        self.transition(FlowState::Exchanging);
        let token = match self.tokens.exchange_code(&self.session, &code).await {
            Ok(token) => token,
            Err(e) => return Err(self.abort(e)),
        };
        self.transition(FlowState::Exchanged);

        let account = match self.accounts.fetch_account(&token.access_token).await {
            Ok(account) => account,
            Err(e) => return Err(self.abort(e)),
        };

        let refresh_token = match token.refresh_token() {
            Ok(refresh_token) => refresh_token.to_owned(),
            Err(e) => return Err(self.abort(e)),
        };

        self.transition(FlowState::Refreshing);
        let refreshed = match self.tokens.refresh(&self.session, &refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => return Err(self.abort(e)),
        };

        let refreshed_account = match self.accounts.fetch_account(&refreshed.access_token).await {
            Ok(account) => account,
            Err(e) => return Err(self.abort(e)),
        };
        self.transition(FlowState::Done);

        Ok(FlowOutcome {
            token,
            account,
            refreshed,
            refreshed_account,
        })
    }

    fn validate(&self, callback: CallbackRequest) -> Result<String> {
        if !self.session.state_matches(callback.state.as_deref()) {
            return Err(Error::StateMismatch {
                expected: self.session.csrf_state().to_string(),
                received: callback.state,
            });
        }

        if let Some(error) = callback.error {
            return Err(Error::AuthorizationDenied {
                error,
                description: callback.error_description.unwrap_or_default(),
            });
        }

        callback
            .code
            .filter(|code| !code.is_empty())
            .ok_or(Error::MissingCode)
    }

    fn transition(&mut self, next: FlowState) {
        debug!(from = ?self.state, to = ?next, "flow state");
        self.state = next;
    }

    fn abort(&mut self, error: Error) -> Error {
        let next = match error.kind() {
            ErrorKind::StateMismatch => FlowState::AbortedStateMismatch,
            ErrorKind::ProviderError => FlowState::AbortedProviderError,
            ErrorKind::Transport
            | ErrorKind::Decode
            | ErrorKind::ListenerBind
            | ErrorKind::Config => FlowState::AbortedTransportError,
        };
        warn!(kind = %error.kind(), %error, from = ?self.state, "flow aborted");
        self.state = next;
        error
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::type_complexity)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use proptest::prelude::*;
    use std::sync::Mutex;

    /// Records every grant and answers from canned responses.
    struct FakeTokens {
        calls: Mutex<Vec<(String, String)>>,
        exchange: Box<dyn Fn() -> Result<Token> + Send + Sync>,
        refresh: Box<dyn Fn() -> Result<Token> + Send + Sync>,
    }

    impl FakeTokens {
        fn new(
            exchange: impl Fn() -> Result<Token> + Send + Sync + 'static,
            refresh: impl Fn() -> Result<Token> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                exchange: Box::new(exchange),
                refresh: Box::new(refresh),
            }
        }

        fn succeeding() -> Self {
            Self::new(
                || Ok(Token::new("AT1").with_refresh_token("RT1")),
                || Ok(Token::new("AT2")),
            )
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TokenGrant for FakeTokens {
        async fn exchange_code(&self, _session: &OAuthSession, code: &str) -> Result<Token> {
            self.calls
                .lock()
                .unwrap()
                .push(("authorization_code".to_string(), code.to_string()));
            (self.exchange)()
        }

        async fn refresh(&self, _session: &OAuthSession, refresh_token: &str) -> Result<Token> {
            self.calls
                .lock()
                .unwrap()
                .push(("refresh_token".to_string(), refresh_token.to_string()));
            (self.refresh)()
        }
    }

    #[derive(Default)]
    struct FakeAccounts {
        bearers: Mutex<Vec<String>>,
    }

    impl FakeAccounts {
        fn bearers(&self) -> Vec<String> {
            self.bearers.lock().unwrap().clone()
        }
    }

    impl AccountApi for FakeAccounts {
        async fn fetch_account(&self, access_token: &str) -> Result<String> {
            self.bearers.lock().unwrap().push(access_token.to_string());
            Ok(format!("{{\"token\":\"{access_token}\"}}"))
        }
    }

    fn controller(tokens: FakeTokens) -> OAuthFlowController<FakeTokens, FakeAccounts> {
        let session = OAuthSession::with_state(&sample_config(), "S").unwrap();
        OAuthFlowController::new(session, tokens, FakeAccounts::default())
    }

    fn callback(code: Option<&str>, state: Option<&str>) -> CallbackRequest {
        CallbackRequest {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..CallbackRequest::default()
        }
    }

    #[tokio::test]
    async fn test_successful_flow_exchanges_then_refreshes() {
        let mut flow = controller(FakeTokens::succeeding());
        assert_eq!(flow.state(), FlowState::Init);

        let outcome = flow
            .handle_callback(callback(Some("abc123"), Some("S")))
            .await
            .unwrap();

        assert_eq!(flow.state(), FlowState::Done);
        assert_eq!(outcome.token.access_token, "AT1");
        assert_eq!(outcome.refreshed.access_token, "AT2");
        assert_eq!(outcome.refreshed_account, "{\"token\":\"AT2\"}");
        assert_eq!(
            flow.tokens.calls(),
            vec![
                ("authorization_code".to_string(), "abc123".to_string()),
                ("refresh_token".to_string(), "RT1".to_string()),
            ]
        );
        assert_eq!(flow.accounts.bearers(), vec!["AT1", "AT2"]);
    }

    #[tokio::test]
    async fn test_state_mismatch_makes_no_token_call() {
        let mut flow = controller(FakeTokens::succeeding());

        let err = flow
            .handle_callback(callback(Some("abc123"), Some("WRONG")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::StateMismatch { ref received, .. } if received.as_deref() == Some("WRONG")
        ));
        assert_eq!(flow.state(), FlowState::AbortedStateMismatch);
        assert!(flow.tokens.calls().is_empty());
        assert!(flow.accounts.bearers().is_empty());
    }

    #[tokio::test]
    async fn test_missing_state_is_a_mismatch() {
        let mut flow = controller(FakeTokens::succeeding());
        let err = flow
            .handle_callback(callback(Some("abc123"), None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateMismatch);
        assert!(flow.tokens.calls().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_skips_account_and_refresh() {
        let mut flow = controller(FakeTokens::new(
            || Err(Error::oauth_error("invalid_grant", "Code already used")),
            || Ok(Token::new("unused")),
        ));

        let err = flow
            .handle_callback(callback(Some("abc123"), Some("S")))
            .await
            .unwrap_err();

        match err {
            Error::OAuth { description, .. } => assert_eq!(description, "Code already used"),
            other => panic!("expected provider error, got {other:?}"),
        }
        assert_eq!(flow.state(), FlowState::AbortedProviderError);
        assert_eq!(flow.tokens.calls().len(), 1);
        assert!(flow.accounts.bearers().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_error_keeps_first_account_call_only() {
        let mut flow = controller(FakeTokens::new(
            || Ok(Token::new("AT1").with_refresh_token("RT1")),
            || Err(Error::oauth_error("invalid_grant", "Token is not active")),
        ));

        let err = flow
            .handle_callback(callback(Some("abc123"), Some("S")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert_eq!(flow.state(), FlowState::AbortedProviderError);
        assert_eq!(flow.accounts.bearers(), vec!["AT1"]);
    }

    #[tokio::test]
    async fn test_no_refresh_token_aborts_before_refresh() {
        let mut flow = controller(FakeTokens::new(
            || Ok(Token::new("AT1")),
            || Ok(Token::new("AT2")),
        ));

        let err = flow
            .handle_callback(callback(Some("abc123"), Some("S")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoRefreshToken));
        assert_eq!(flow.tokens.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_state() {
        let mut flow = controller(FakeTokens::new(
            || Err(Error::Listener(std::io::Error::other("connection refused"))),
            || Ok(Token::new("AT2")),
        ));

        let err = flow
            .handle_callback(callback(Some("abc123"), Some("S")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(flow.state(), FlowState::AbortedTransportError);
    }

    #[tokio::test]
    async fn test_denied_authorization() {
        let mut flow = controller(FakeTokens::succeeding());
        let denied = CallbackRequest {
            state: Some("S".to_string()),
            error: Some("access_denied".to_string()),
            ..CallbackRequest::default()
        };

        let err = flow.handle_callback(denied).await.unwrap_err();

        assert!(matches!(err, Error::AuthorizationDenied { ref error, .. } if error == "access_denied"));
        assert_eq!(flow.state(), FlowState::AbortedProviderError);
        assert!(flow.tokens.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_code() {
        let mut flow = controller(FakeTokens::succeeding());
        let err = flow
            .handle_callback(callback(Some(""), Some("S")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCode));
        assert!(flow.tokens.calls().is_empty());
    }

    proptest! {
        #[test]
        fn prop_mismatched_state_never_reaches_token_endpoint(
            state in proptest::option::of(".{0,40}"),
            code in "[A-Za-z0-9]{1,20}",
        ) {
            prop_assume!(state.as_deref() != Some("S"));

            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let mut flow = controller(FakeTokens::succeeding());

            let result = runtime.block_on(
                flow.handle_callback(callback(Some(&code), state.as_deref())),
            );

            let mismatch = matches!(result, Err(Error::StateMismatch { .. }));
            prop_assert!(mismatch);
            prop_assert!(flow.tokens.calls().is_empty());
            prop_assert!(flow.accounts.bearers().is_empty());
        }
    }
}
