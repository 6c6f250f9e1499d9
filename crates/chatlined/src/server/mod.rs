//! TCP server for chatline.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Greets each client and spawns a `SessionHandler` for it
//! - Supervises session tasks so a crashed session still leaves cleanly
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SessionHandler  │────▶│ SessionRegistry │
//! │  (per client)   │     │                 │
//! └───────┬─────────┘     └────────┬────────┘
//!         │ MSG / join / leave     │ snapshot
//!         ▼                        ▼
//! ┌──────────────────────────────────────────┐
//! │ Broadcaster ── write_line to every peer  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! There is one task per connection and no upper bound on connections.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and allow continued operation

mod session;

pub use session::{
    end_session, SessionHandler, SessionState, SessionSummary, TerminationReason,
};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use chatline_core::{ConnectionId, CredentialStore};
use chatline_protocol::Reply;

use crate::config::ServerConfig;
use crate::registry::SessionRegistry;
use crate::transport::{LineReader, LineWriter};

/// TCP chat server.
///
/// Owns the listener and the session registry shared by all sessions.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Registry of authenticated sessions
    registry: SessionRegistry,

    /// Credential lookup shared by every session
    credentials: Arc<dyn CredentialStore>,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection IDs
    connection_counter: AtomicU64,
}

impl ChatServer {
    /// Binds the listener described by `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration (listen address)
    /// * `credentials` - Credential lookup used by AUTH
    /// * `cancel_token` - Token for graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub async fn bind(
        config: &ServerConfig,
        credentials: Arc<dyn CredentialStore>,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(config.listen_addr)
                .await
                .map_err(|e| ServerError::Bind {
                    addr: config.listen_addr,
                    error: e.to_string(),
                })?;

        Ok(Self {
            listener,
            registry: SessionRegistry::new(),
            credentials,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))
    }

    /// Returns a handle to the session registry.
    pub fn registry(&self) -> SessionRegistry {
        self.registry.clone()
    }

    /// Runs the accept loop until the cancellation token is triggered.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr()?, "Chat server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, ConnectionId::new(conn_num));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Server stopped accepting connections");
        Ok(())
    }

    /// Greets the client and spawns its session task plus a supervisor.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, id: ConnectionId) {
        info!(connection = %id, peer = %peer, "Client connected");

        if let Err(e) = stream.set_nodelay(true) {
            debug!(connection = %id, error = %e, "Failed to disable Nagle");
        }

        let (reader, writer) = stream.into_split();
        let reader = LineReader::new(reader);
        let writer = LineWriter::new(writer);
        let registry = self.registry.clone();
        let credentials = Arc::clone(&self.credentials);

        let session_task = tokio::spawn(async move {
            if let Err(e) = writer.write_line(&Reply::Ready.to_string()).await {
                debug!(connection = %id, error = %e, "Failed to send greeting");
                return None;
            }

            let handler = SessionHandler::new(id, reader, writer, registry, credentials);
            Some(handler.run().await)
        });

        let registry = self.registry.clone();
        tokio::spawn(async move {
            match session_task.await {
                Ok(Some(summary)) => {
                    info!(
                        connection = %summary.id,
                        username = ?summary.username.as_ref().map(|u| u.as_str()),
                        reason = %summary.reason,
                        "Client disconnected"
                    );
                }
                Ok(None) => {
                    debug!(connection = %id, "Client disconnected before greeting");
                }
                Err(e) => {
                    error!(connection = %id, error = %e, "Session task failed");
                    end_session(&registry, id).await;
                }
            }
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Failed to read local address: {0}")]
    LocalAddr(String),
}
