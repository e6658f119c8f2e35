//! # codegrant-oauth
//!
//! `OAuth2` Authorization Code grant with CSRF state protection and the
//! refresh grant, against a remote identity provider.
//!
//! ## Features
//!
//! - **Session**: immutable flow parameters with a per-session random state
//! - **Redirect listener**: one-shot loopback endpoint on `/oauth`
//! - **Token client**: `authorization_code` and `refresh_token` grants
//! - **Flow controller**: state machine from authorization URL to refreshed token
//!
//! ## Quick Start
//!
//! ```ignore
//! use codegrant_oauth::{OAuthConfig, OAuthFlowController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: OAuthConfig = serde_json::from_str(&std::fs::read_to_string("config.json")?)?;
//!     let mut flow = OAuthFlowController::from_config(&config)?;
//!
//!     let outcome = flow
//!         .run(|url| println!("Please open the following URL in your browser:\n{url}"))
//!         .await?;
//!
//!     println!("Access token: {}", outcome.token.access_token);
//!     println!("Refreshed token: {}", outcome.refreshed.access_token);
//!     Ok(())
//! }
//! ```
//!
//! ## Driving the flow without a socket
//!
//! [`OAuthFlowController::handle_callback`] runs everything after the
//! redirect, and the token endpoint and account lookup sit behind the
//! [`TokenGrant`] and [`AccountApi`] traits.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod config;
mod error;
pub mod flow;
pub mod listener;
pub mod session;
pub mod token;

pub use account::{AccountApi, AccountClient};
pub use config::OAuthConfig;
pub use error::{Error, ErrorKind, Result};
pub use flow::{FlowOutcome, FlowState, OAuthFlowController, authorization_url};
pub use listener::{CallbackRequest, PendingCallback, RedirectListener};
pub use session::OAuthSession;
pub use token::{Token, TokenClient, TokenGrant, TokenResponse};
