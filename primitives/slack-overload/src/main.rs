//! Slack Overload - Status Triggers for Slack
//!
//! Serves the slash commands (`/trigger`, `/create-trigger`, `/list-triggers`,
//! `/delete-trigger`, `/clear-status`, `/link-slack`) and the OAuth redirect
//! that links Slack accounts together.
//!
//! # Usage
//!
//! ```bash
//! slack-overload \
//!     --signing-secret "$SLACK_SIGNING_SECRET" \
//!     --session-key "$(openssl rand -hex 32)" \
//!     --client-id 123.456 --client-secret shhh
//!
//! # Verbose request logging
//! RUST_LOG=slack_overload=debug,overload_core=debug slack-overload --debug ...
//! ```

mod command;
mod message;
mod routes;
mod secrets;
mod session;
mod signature;
mod slack;
mod storage;

use anyhow::Context;
use clap::Parser;
use overload_core::{Collaborators, Overload, Settings};
use routes::AppState;
use secrets::FileVault;
use session::SessionKey;
use slack::SlackClient;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use storage::BlobStore;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Slash-command webhook that applies status triggers across linked Slack accounts.
#[derive(Parser, Debug, Clone)]
#[command(name = "slack-overload")]
#[command(about = "Slack slash commands for presence, status and do-not-disturb triggers")]
struct Args {
    /// Host to bind to.
    #[arg(long, env = "SLACK_OVERLOAD_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "SLACK_OVERLOAD_PORT", default_value = "8080")]
    port: u16,

    /// Directory holding triggers, users and the secret vault.
    #[arg(long, env = "SLACK_OVERLOAD_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Slack app signing secret used to verify slash command requests.
    #[arg(long, env = "SLACK_OVERLOAD_SIGNING_SECRET", hide_env_values = true)]
    signing_secret: String,

    /// Key for signing the session cookie set after OAuth.
    #[arg(long, env = "SLACK_OVERLOAD_SESSION_KEY", hide_env_values = true)]
    session_key: String,

    /// Slack app OAuth client id.
    #[arg(long, env = "SLACK_OVERLOAD_CLIENT_ID")]
    client_id: String,

    /// Slack app OAuth client secret.
    #[arg(long, env = "SLACK_OVERLOAD_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Slack Web API base URL.
    #[arg(long, env = "SLACK_OVERLOAD_API_URL", default_value = "https://slack.com/api")]
    api_url: String,

    /// Slack API request timeout in seconds.
    #[arg(long, env = "SLACK_OVERLOAD_API_TIMEOUT", default_value = "10")]
    api_timeout: u64,

    /// Storage and vault operation timeout in seconds.
    #[arg(long, env = "SLACK_OVERLOAD_STORAGE_TIMEOUT", default_value = "3")]
    storage_timeout: u64,

    /// Where new users are sent to get started.
    #[arg(
        long,
        env = "SLACK_OVERLOAD_LANDING_URL",
        default_value = "https://slackoverload.com/quickstart"
    )]
    landing_url: String,

    /// Log every status update and Slack API response.
    #[arg(long, env = "SLACK_OVERLOAD_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let storage_timeout = Duration::from_secs(args.storage_timeout);
    let blobs = BlobStore::open(&args.data_dir, storage_timeout)
        .await
        .with_context(|| format!("could not open storage in {}", args.data_dir.display()))?;
    let vault_dir = args.data_dir.join("vault");
    let vault = FileVault::open(&vault_dir, storage_timeout)
        .await
        .with_context(|| format!("could not open vault in {}", vault_dir.display()))?;

    let slack = Arc::new(
        SlackClient::new(
            &args.api_url,
            &args.client_id,
            &args.client_secret,
            Duration::from_secs(args.api_timeout),
            args.debug,
        )
        .context("could not build the Slack API client")?,
    );

    let overload = Overload::new(
        Collaborators {
            templates: Arc::new(blobs.clone()),
            users: Arc::new(blobs),
            credentials: Arc::new(vault),
            status_api: slack.clone(),
            oauth: slack,
        },
        Settings {
            client_id: args.client_id.clone(),
            landing_url: args.landing_url.clone(),
            debug: args.debug,
        },
    );

    let state = Arc::new(AppState {
        overload: Arc::new(overload),
        session: SessionKey::new(&args.session_key),
        signing_secret: args.signing_secret.clone(),
    });
    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;

    // Set up SIGTERM handler for graceful shutdown
    let mut sigterm = signal(SignalKind::terminate())?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!(%addr, data_dir = %args.data_dir.display(), "slack overload listening");

    let server = axum::serve(listener, app.into_make_service());

    tokio::select! {
        result = server => {
            result?;
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
        }
    }

    Ok(())
}
