//! chatline console client
//!
//! Connects to a chatline server, authenticates and then lets the user
//! chat while a background task prints incoming lines.
//!
//! # Usage
//!
//! ```bash
//! chatline --server 127.0.0.1:65432
//! ```
//!
//! Type text to send it; `/quit` leaves. Ctrl+C or closing stdin also
//! leaves after telling the server.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use chatline_client::client::PROMPT;
use chatline_client::render::render;
use chatline_client::{
    receive_loop, spawn_line_reader, ChatConnection, ClientConfig, ClientError, InputAction,
    ReceiverExit,
};

/// How long to wait for the server's goodbye after sending QUIT
const GOODBYE_GRACE: Duration = Duration::from_secs(1);

/// chatline client - interactive console chat
#[derive(Parser, Debug)]
#[command(name = "chatline", version, about)]
struct Args {
    /// Server address as host:port (overrides CHATLINE_SERVER)
    #[arg(short, long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never mix with the chat on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("chatline_client=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env();
    if let Some(server_addr) = args.server {
        config.server_addr = server_addr;
    }

    let mut conn = ChatConnection::connect(&config).await?;

    let greeting = conn.recv().await.context("No greeting from server")?;
    println!("{}", render(&greeting));

    let mut stdin = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let username = prompt(&mut stdin, "Usuario: ").await?;
    let password = prompt(&mut stdin, "Password: ").await?;

    match conn.authenticate(&username, &password).await {
        Ok(reply) => println!("{}", render(&reply)),
        Err(ClientError::AuthRejected(line)) => {
            println!("{line}");
            println!("No autenticado. Saliendo.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let (reader, mut sender) = conn.into_parts();
    let cancel_token = CancellationToken::new();
    let mut receiver = tokio::spawn(receive_loop(
        reader,
        tokio::io::stdout(),
        cancel_token.clone(),
    ));

    show_prompt()?;

    loop {
        tokio::select! {
            line = stdin.recv() => {
                let Some(line) = line else {
                    debug!("Console input closed");
                    if let Err(e) = sender.quit().await {
                        warn!(error = %e, "Failed to send QUIT");
                    }
                    break;
                };

                match InputAction::from_line(&line) {
                    None => show_prompt()?,
                    Some(action) => {
                        sender.send(&action.to_command()).await?;
                        if action == InputAction::Quit {
                            break;
                        }
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                if let Err(e) = sender.quit().await {
                    warn!(error = %e, "Failed to send QUIT");
                }
                break;
            }

            result = &mut receiver => {
                match result {
                    Ok(Ok(exit)) => debug!(exit = ?exit, "Receiver stopped"),
                    Ok(Err(e)) => warn!(error = %e, "Receiver failed"),
                    Err(e) => warn!(error = %e, "Receiver task failed"),
                }
                return Ok(());
            }
        }
    }

    // Let the receiver print the server's goodbye before exiting
    match tokio::time::timeout(GOODBYE_GRACE, &mut receiver).await {
        Ok(Ok(Ok(ReceiverExit::Goodbye))) => {}
        Ok(_) => debug!("Receiver stopped without goodbye"),
        Err(_) => cancel_token.cancel(),
    }

    Ok(())
}

/// Prints a label and reads one trimmed line from the console.
async fn prompt(stdin: &mut mpsc::Receiver<String>, label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;

    let line = stdin.recv().await.context("Console input closed")?;
    Ok(line.trim().to_string())
}

fn show_prompt() -> Result<()> {
    print!("{PROMPT}");
    std::io::stdout().flush()?;
    Ok(())
}
