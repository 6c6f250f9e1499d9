//! chatline server
//!
//! Accepts TCP connections, authenticates each against a static
//! credential table and relays chat lines to every authenticated peer.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:65432) with the demo users
//! chatlined
//!
//! # Custom address and credential file
//! chatlined --listen 127.0.0.1:7000 --credentials users.toml
//!
//! # Same, from the environment
//! CHATLINE_LISTEN=127.0.0.1:7000 CHATLINE_CREDENTIALS=users.toml chatlined
//!
//! # Enable debug logging
//! RUST_LOG=chatlined=debug chatlined
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting connections and exit

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatlined::config::ServerConfig;
use chatlined::server::ChatServer;

/// chatline server - line-based chat broadcaster
#[derive(Parser, Debug)]
#[command(name = "chatlined", version, about)]
struct Args {
    /// Address to listen on (overrides CHATLINE_LISTEN)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// TOML credential file (overrides CHATLINE_CREDENTIALS)
    #[arg(short, long)]
    credentials: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatlined=info".parse()?)
                .add_directive("chatline_core=info".parse()?)
                .add_directive("chatline_protocol=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::from_env();
    if let Some(listen_addr) = args.listen {
        config.listen_addr = listen_addr;
    }
    if let Some(path) = args.credentials {
        config.credentials_path = Some(path);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "chatline server starting"
    );

    let credentials = config
        .load_credentials()
        .context("Failed to load credentials")?;
    info!(users = credentials.len(), "Credentials loaded");

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let server = ChatServer::bind(&config, Arc::new(credentials), cancel_token)
        .await
        .context("Failed to start server")?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("chatline server stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
