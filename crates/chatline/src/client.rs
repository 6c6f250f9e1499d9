//! Server connection for the chatline console client.
//!
//! This module provides:
//! - `ChatConnection`: connects, reads the greeting and authenticates
//! - `MessageSender`: the write side once the session is established
//! - `receive_loop`: prints server lines until goodbye, EOF or cancellation
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::env;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chatline_protocol::{Command, Reply};

use crate::error::{ClientError, Result};
use crate::render::render;

/// Environment variable overriding the server address
pub const SERVER_ENV: &str = "CHATLINE_SERVER";

/// Default server address
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:65432";

/// Printed when the server closes the connection unannounced.
const SERVER_CLOSED_NOTICE: &str = "[Conexión cerrada por el servidor]";

/// Console prompt.
pub const PROMPT: &str = "> ";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the chat client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host:port` of the chat server.
    pub server_addr: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
        }
    }
}

impl ClientConfig {
    /// Reads `CHATLINE_SERVER`, falling back to the default address.
    pub fn from_env() -> Self {
        env::var(SERVER_ENV)
            .map(|server_addr| Self { server_addr })
            .unwrap_or_default()
    }
}

// ============================================================================
// Connection
// ============================================================================

/// An open connection to the chat server.
pub struct ChatConnection<R, W> {
    reader: BufReader<R>,
    writer: MessageSender<W>,
}

impl ChatConnection<OwnedReadHalf, OwnedWriteHalf> {
    /// Connects to the configured server.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let stream = TcpStream::connect(&config.server_addr)
            .await
            .map_err(|e| ClientError::Connect {
                addr: config.server_addr.clone(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        debug!(addr = %config.server_addr, "Connected to server");
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }
}

impl<R, W> ChatConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: MessageSender { writer },
        }
    }

    /// Reads the next server line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ServerClosed` at end-of-stream.
    pub async fn recv(&mut self) -> Result<Reply> {
        read_reply(&mut self.reader)
            .await?
            .ok_or(ClientError::ServerClosed)
    }

    /// Sends one command.
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        self.writer.send(command).await
    }

    /// Sends AUTH and returns the server's `230` acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::AuthRejected` with the server's line if the
    /// answer is not a `230`.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<Reply> {
        self.send(&Command::auth(username, password)).await?;

        let reply = self.recv().await?;
        if reply.code() == Some(230) {
            Ok(reply)
        } else {
            Err(ClientError::AuthRejected(reply.to_string()))
        }
    }

    /// Splits into a reader for [`receive_loop`] and a sender.
    pub fn into_parts(self) -> (BufReader<R>, MessageSender<W>) {
        (self.reader, self.writer)
    }
}

/// Write side of an established session.
pub struct MessageSender<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageSender<W> {
    /// Writes one command line and flushes it.
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        let line = command.to_string();
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn quit(&mut self) -> Result<()> {
        self.send(&Command::Quit).await
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// Why [`receive_loop`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverExit {
    /// The server sent a `221` line.
    Goodbye,
    /// The server closed the connection.
    ServerClosed,
    /// The cancellation token fired.
    Cancelled,
}

/// Prints every server line to `out` until goodbye, EOF or cancellation.
///
/// Broadcasts are rendered as `[<user>] <text>`, anything else verbatim.
/// The prompt is redrawn after each line except the last.
pub async fn receive_loop<R, O>(
    mut reader: BufReader<R>,
    mut out: O,
    cancel_token: CancellationToken,
) -> Result<ReceiverExit>
where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    loop {
        let reply = tokio::select! {
            _ = cancel_token.cancelled() => return Ok(ReceiverExit::Cancelled),
            result = read_reply(&mut reader) => result?,
        };

        let Some(reply) = reply else {
            out.write_all(format!("\r{SERVER_CLOSED_NOTICE}\n").as_bytes())
                .await?;
            out.flush().await?;
            return Ok(ReceiverExit::ServerClosed);
        };

        out.write_all(format!("\r{}\n", render(&reply)).as_bytes())
            .await?;

        if reply.is_goodbye() {
            out.flush().await?;
            return Ok(ReceiverExit::Goodbye);
        }

        out.write_all(PROMPT.as_bytes()).await?;
        out.flush().await?;
    }
}

/// Reads one line, replacing invalid UTF-8. `None` at end-of-stream.
async fn read_reply<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<Option<Reply>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(Some(Reply::parse(line.trim())))
}
