//! evspot - command-line client for evspot account sessions.
//!
//! Restores the stored session on every run, then signs in, registers,
//! signs out or reports who is signed in.

mod commands;
mod form;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use evspot_core::{Config, IdentityClient, SessionManager};

#[derive(Debug, Parser)]
#[command(name = "evspot", version, about = "Sign in to evspot from the command line")]
struct Cli {
    /// Identity Service base URL (overrides EVSPOT_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show who is signed in
    Status {
        /// Print the full state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Forget the stored session
    Logout,
}

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes buffered log lines when dropped.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    debug!(?cli, "evspot starting");

    // A broken config file is reported, never replaced with defaults
    let mut config = Config::load()?;
    // --api-url applies to this run only and is never saved
    let identity = match cli.api_url {
        Some(url) => IdentityClient::with_timeout(&url, config.request_timeout())?,
        None => config.identity_client()?,
    };
    info!(api_url = identity.base_url(), store = ?config.store, "Session manager configured");
    let manager = SessionManager::new(Arc::new(identity), config.open_store().await?);
    commands::watch_state(&manager);

    manager.hydrate().await;

    match cli.command {
        Command::Status { json } => commands::status(&manager, json),
        Command::Login { email } => commands::login(&manager, &mut config, email).await,
        Command::Register { name, email } => {
            commands::register(&manager, &mut config, &name, &email).await
        }
        Command::Logout => commands::logout(&manager).await,
    }
}
