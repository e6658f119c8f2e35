//! Authorization code flow orchestration.

mod controller;
mod authorize;

pub use controller::{FlowOutcome, OAuthFlowController};
pub use authorize::authorization_url;

/// Progress of one authorization code flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    /// Session created, nothing sent yet.
    #[default]
    Init,
    /// Authorization URL handed out, waiting for the redirect.
    AwaitingCallback,
    /// Checking the callback's state.
    Validating,
    /// Exchanging the authorization code.
    Exchanging,
    /// Code exchanged for an access token.
    Exchanged,
    /// Exercising the refresh grant.
    Refreshing,
    /// Refresh succeeded; flow complete.
    Done,
    /// Callback state did not match.
    AbortedStateMismatch,
    /// Provider refused or answered unusably.
    AbortedProviderError,
    /// Network, decoding or listener failure.
    AbortedTransportError,
}
