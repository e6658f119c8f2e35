//! `codegrant` - OAuth2 authorization code flow demo.
//!
//! Loads the provider configuration, prints the authorization URL, waits for
//! the redirect on the local listener, then shows the exchanged and the
//! refreshed token together with the account information fetched with each.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;

use std::process::ExitCode;

use codegrant_oauth::{Error, FlowOutcome, OAuthFlowController};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codegrant=info,codegrant_oauth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let path = config::resolve_config_path(
        std::env::args().nth(1),
        std::env::var_os(config::CONFIG_ENV),
    );
    info!(path = %path.display(), "Starting codegrant");

    let config = config::load_config(&path).await?;
    let open_browser = config.open_browser;
    let mut flow = OAuthFlowController::from_config(&config)?;

    let outcome = flow
        .run(|url| {
            println!("Please open the following URL in your browser: \n{url}");
            if open_browser {
                if let Err(e) = opener::open(url.as_str()) {
                    warn!(error = %e, "could not launch browser");
                }
            }
        })
        .await?;

    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &FlowOutcome) {
    println!("Received new token: {}", outcome.token.access_token);
    println!("{}", format_account(&outcome.account));
    println!("Received new token: {}", outcome.refreshed.access_token);
    println!("{}", format_account(&outcome.refreshed_account));
}

/// Pretty-prints JSON bodies; anything else is shown as received.
fn format_account(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| body.to_string())
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(Error::OAuth { description, .. }) => {
            eprintln!("{}: {description}", codegrant_oauth::ErrorKind::ProviderError);
        }
        Some(flow_error) => eprintln!("{}: {flow_error}", flow_error.kind()),
        None => eprintln!("error: {err:#}"),
    }
}
