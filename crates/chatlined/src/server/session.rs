//! Per-connection session state machine.
//!
//! Each accepted connection gets its own `SessionHandler`, which:
//! - Reads lines from the peer and parses them into commands
//! - Authenticates against the credential store
//! - Registers the session and broadcasts join/leave notices
//! - Relays chat lines through the broadcaster
//!
//! ```text
//!                 AUTH ok
//!  Unauthenticated ───────▶ Authenticated
//!        │                        │
//!        │ QUIT / EOF / I/O error │
//!        └──────────┬─────────────┘
//!                   ▼
//!               Terminated
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Transport errors end the session; they never reach other sessions

use std::fmt;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tracing::{debug, error, info, warn};

use chatline_core::{ConnectionId, CredentialStore, Username};
use chatline_protocol::{Command, Credentials, Reply};

use crate::broadcast::Broadcaster;
use crate::registry::{RegisteredSession, SessionRegistry};
use crate::transport::{LineReader, LineWriter, TransportError};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { username: Username },
    Terminated,
}

impl SessionState {
    pub fn username(&self) -> Option<&Username> {
        match self {
            Self::Authenticated { username } => Some(username),
            _ => None,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone)]
pub enum TerminationReason {
    /// The peer sent QUIT.
    Quit,
    /// The peer closed the connection.
    Disconnected,
    /// Reading or writing failed.
    Transport(TransportError),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => f.write_str("quit"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

/// Returned by [`SessionHandler::run`] once the session has been torn down.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: ConnectionId,
    /// Name the session was authenticated as when it ended, if any.
    pub username: Option<Username>,
    pub reason: TerminationReason,
}

enum Flow {
    Continue,
    Quit,
}

/// Drives one connection from greeting to teardown.
pub struct SessionHandler<R> {
    id: ConnectionId,
    reader: LineReader<R>,
    writer: LineWriter,
    state: SessionState,
    registry: SessionRegistry,
    broadcaster: Broadcaster,
    credentials: Arc<dyn CredentialStore>,
}

impl<R: AsyncRead + Unpin> SessionHandler<R> {
    /// Creates a handler in the `Unauthenticated` state.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identity of the connection
    /// * `reader` - Read side of the connection, owned by this session
    /// * `writer` - Write side; a clone is handed to the registry on AUTH
    /// * `registry` - Shared registry of authenticated sessions
    /// * `credentials` - Read-only credential lookup
    pub fn new(
        id: ConnectionId,
        reader: LineReader<R>,
        writer: LineWriter,
        registry: SessionRegistry,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            id,
            reader,
            writer,
            state: SessionState::Unauthenticated,
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            credentials,
        }
    }

    /// Processes lines until QUIT, end-of-stream or a transport failure,
    /// then tears the session down.
    pub async fn run(mut self) -> SessionSummary {
        debug!(connection = %self.id, "Session started");

        let reason = self.process_lines().await;
        let username = self.terminate().await;

        SessionSummary {
            id: self.id,
            username,
            reason,
        }
    }

    async fn process_lines(&mut self) -> TerminationReason {
        loop {
            let line = match self.reader.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(connection = %self.id, "Client sent EOF");
                    return TerminationReason::Disconnected;
                }
                Err(e) => {
                    debug!(connection = %self.id, error = %e, "Read failed");
                    return TerminationReason::Transport(e);
                }
            };

            let Some(command) = Command::parse(&line) else {
                continue;
            };

            match self.handle_command(command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => return TerminationReason::Quit,
                Err(e) => {
                    debug!(connection = %self.id, error = %e, "Write failed");
                    return TerminationReason::Transport(e);
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<Flow, TransportError> {
        match command {
            Command::Auth(credentials) => self.handle_auth(credentials).await?,

            Command::MalformedAuth(e) => {
                debug!(connection = %self.id, error = %e, "Malformed AUTH");
                self.send(Reply::error(e.to_string())).await?;
            }

            Command::Msg { text } => self.handle_msg(&text).await?,

            Command::Quit => {
                debug!(connection = %self.id, "Client requested disconnect");
                self.send(Reply::Bye).await?;
                return Ok(Flow::Quit);
            }

            Command::Unknown { verb } => {
                debug!(connection = %self.id, verb = %verb, "Unknown command");
                self.send(Reply::error("Unknown command")).await?;
            }
        }

        Ok(Flow::Continue)
    }

    async fn handle_auth(&mut self, credentials: Credentials) -> Result<(), TransportError> {
        let verified = self
            .credentials
            .verify(&credentials.username, &credentials.password);

        // A name the store accepted is always a valid protocol token.
        let username = match Username::new(credentials.username) {
            Ok(username) if verified => username,
            Ok(username) => {
                info!(connection = %self.id, username = %username, "Authentication failed");
                return self.send(Reply::AuthFail).await;
            }
            Err(_) => {
                info!(connection = %self.id, "Authentication failed");
                return self.send(Reply::AuthFail).await;
            }
        };

        match self.state.clone() {
            SessionState::Unauthenticated => {
                let entry = RegisteredSession::new(self.id, username.clone(), self.writer.clone());
                if let Err(e) = self.registry.register(entry).await {
                    error!(connection = %self.id, error = %e, "Failed to register session");
                    return self.send(Reply::AuthFail).await;
                }

                info!(connection = %self.id, username = %username, "Client authenticated");
                self.state = SessionState::Authenticated {
                    username: username.clone(),
                };
                self.send(Reply::AuthOk).await?;
                self.broadcast(&Reply::joined(&username)).await;
            }

            SessionState::Authenticated { username: current } if current == username => {
                debug!(connection = %self.id, username = %username, "Repeated AUTH");
                self.send(Reply::AuthOk).await?;
            }

            SessionState::Authenticated { .. } => {
                let previous = match self.registry.rebind(self.id, username.clone()).await {
                    Ok(previous) => previous,
                    Err(e) => {
                        error!(connection = %self.id, error = %e, "Failed to rebind session");
                        return self.send(Reply::AuthFail).await;
                    }
                };

                info!(
                    connection = %self.id,
                    from = %previous,
                    to = %username,
                    "Client re-authenticated"
                );
                self.state = SessionState::Authenticated {
                    username: username.clone(),
                };
                self.send(Reply::AuthOk).await?;
                self.broadcast(&Reply::joined(&username)).await;
            }

            SessionState::Terminated => {
                warn!(connection = %self.id, "AUTH on terminated session ignored");
            }
        }

        Ok(())
    }

    async fn handle_msg(&mut self, text: &str) -> Result<(), TransportError> {
        let Some(username) = self.state.username() else {
            return self.send(Reply::Forbidden).await;
        };

        let reply = Reply::message(username.as_str(), text);
        self.broadcast(&reply).await;
        Ok(())
    }

    /// Moves to `Terminated`, unregisters, announces the leave and closes
    /// the transport. Returns the name the session held, if any.
    async fn terminate(&mut self) -> Option<Username> {
        let previous = std::mem::replace(&mut self.state, SessionState::Terminated);

        end_session(&self.registry, self.id).await;

        if let Err(e) = self.writer.shutdown().await {
            debug!(connection = %self.id, error = %e, "Failed to close transport");
        }

        match previous {
            SessionState::Authenticated { username } => Some(username),
            _ => None,
        }
    }

    async fn send(&self, reply: Reply) -> Result<(), TransportError> {
        self.writer.write_line(&reply.to_string()).await
    }

    async fn broadcast(&self, reply: &Reply) {
        self.broadcaster.broadcast(&reply.to_string()).await;
    }
}

/// Removes a connection from the registry and, if it was registered,
/// tells the remaining sessions it left.
///
/// Safe to call more than once for the same connection.
pub async fn end_session(
    registry: &SessionRegistry,
    id: ConnectionId,
) -> Option<RegisteredSession> {
    let removed = registry.unregister(id).await?;

    let elapsed = chrono::Utc::now().signed_duration_since(removed.joined_at);
    info!(
        connection = %id,
        username = %removed.username,
        seconds = elapsed.num_seconds(),
        "Client left"
    );

    Broadcaster::new(registry.clone())
        .broadcast(&Reply::left(&removed.username).to_string())
        .await;

    Some(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::CredentialTable;
    use tokio::io::{duplex, split, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
    use tokio::task::JoinHandle;
    use tokio::time::{timeout, Duration};

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    /// In-memory peer driving a spawned session.
    struct TestPeer {
        reader: LineReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
        task: JoinHandle<SessionSummary>,
    }

    impl TestPeer {
        fn spawn(id: u64, registry: &SessionRegistry) -> Self {
            let (client, server) = duplex(4096);
            let (server_read, server_write) = split(server);
            let credentials: Arc<dyn CredentialStore> = Arc::new(
                CredentialTable::from_pairs([("isma", "1234"), ("Ana", "2512")]).unwrap(),
            );

            let handler = SessionHandler::new(
                ConnectionId::new(id),
                LineReader::new(server_read),
                LineWriter::new(server_write),
                registry.clone(),
                credentials,
            );
            let task = tokio::spawn(handler.run());

            let (client_read, client_write) = split(client);
            Self {
                reader: LineReader::new(client_read),
                writer: client_write,
                task,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> Option<String> {
            timeout(RECV_TIMEOUT, self.reader.read_line())
                .await
                .expect("timed out waiting for line")
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_auth_success_registers_and_announces() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH isma 1234").await;
        assert_eq!(peer.recv().await.as_deref(), Some("230 AUTH OK"));
        assert_eq!(
            peer.recv().await.as_deref(),
            Some("250 MSG server isma se ha conectado")
        );
        assert_eq!(registry.usernames().await, vec!["isma"]);
    }

    #[tokio::test]
    async fn test_auth_failure_allows_retry() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH isma wrongpass").await;
        assert_eq!(peer.recv().await.as_deref(), Some("430 AUTH FAIL"));
        peer.send("AUTH nobody 1234").await;
        assert_eq!(peer.recv().await.as_deref(), Some("430 AUTH FAIL"));
        assert!(registry.is_empty().await);

        peer.send("auth isma 1234").await;
        assert_eq!(peer.recv().await.as_deref(), Some("230 AUTH OK"));
        assert!(registry.contains(ConnectionId::new(1)).await);
    }

    #[tokio::test]
    async fn test_malformed_auth_and_unknown_verbs() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH isma").await;
        assert_eq!(
            peer.recv().await.as_deref(),
            Some("500 ERROR Missing credentials")
        );
        peer.send("AUTH isma 12 34").await;
        assert_eq!(
            peer.recv().await.as_deref(),
            Some("500 ERROR Malformed credentials")
        );
        peer.send("HELLO there").await;
        assert_eq!(
            peer.recv().await.as_deref(),
            Some("500 ERROR Unknown command")
        );
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_msg_before_auth_is_forbidden() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("MSG hola").await;
        assert_eq!(peer.recv().await.as_deref(), Some("403 FORBIDDEN"));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_blank_lines_are_ignored() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("").await;
        peer.send("   ").await;
        peer.send("QUIT").await;
        assert_eq!(peer.recv().await.as_deref(), Some("221 BYE"));
    }

    #[tokio::test]
    async fn test_msg_is_echoed_to_sender() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH isma 1234").await;
        peer.recv().await;
        peer.recv().await;

        peer.send("MSG hola a todos").await;
        assert_eq!(peer.recv().await.as_deref(), Some("250 MSG isma hola a todos"));
        peer.send("MSG").await;
        assert_eq!(peer.recv().await.as_deref(), Some("250 MSG isma "));
    }

    #[tokio::test]
    async fn test_quit_unregisters_and_closes() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH isma 1234").await;
        peer.recv().await;
        peer.recv().await;

        peer.send("QUIT").await;
        assert_eq!(peer.recv().await.as_deref(), Some("221 BYE"));
        assert_eq!(peer.recv().await, None);

        let summary = peer.task.await.unwrap();
        assert!(matches!(summary.reason, TerminationReason::Quit));
        assert_eq!(summary.username.map(|u| u.to_string()), Some("isma".to_string()));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_eof_terminates_silently() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH Ana 2512").await;
        peer.recv().await;
        peer.recv().await;

        peer.writer.shutdown().await.unwrap();
        assert_eq!(peer.recv().await, None);

        let summary = peer.task.await.unwrap();
        assert!(matches!(summary.reason, TerminationReason::Disconnected));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_reauth_same_user_does_not_rebroadcast() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH isma 1234").await;
        peer.recv().await;
        peer.recv().await;

        peer.send("AUTH isma 1234").await;
        assert_eq!(peer.recv().await.as_deref(), Some("230 AUTH OK"));
        peer.send("QUIT").await;
        assert_eq!(peer.recv().await.as_deref(), Some("221 BYE"));
    }

    #[tokio::test]
    async fn test_reauth_as_other_user_rebinds() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH isma 1234").await;
        peer.recv().await;
        peer.recv().await;

        peer.send("AUTH Ana 2512").await;
        assert_eq!(peer.recv().await.as_deref(), Some("230 AUTH OK"));
        assert_eq!(
            peer.recv().await.as_deref(),
            Some("250 MSG server Ana se ha conectado")
        );
        assert_eq!(registry.usernames().await, vec!["Ana"]);

        peer.send("MSG hi").await;
        assert_eq!(peer.recv().await.as_deref(), Some("250 MSG Ana hi"));
    }

    #[tokio::test]
    async fn test_failed_reauth_keeps_identity() {
        let registry = SessionRegistry::new();
        let mut peer = TestPeer::spawn(1, &registry);

        peer.send("AUTH isma 1234").await;
        peer.recv().await;
        peer.recv().await;

        peer.send("AUTH Ana nope").await;
        assert_eq!(peer.recv().await.as_deref(), Some("430 AUTH FAIL"));
        peer.send("MSG still me").await;
        assert_eq!(peer.recv().await.as_deref(), Some("250 MSG isma still me"));
    }

    #[tokio::test]
    async fn test_leave_notice_reaches_remaining_sessions() {
        let registry = SessionRegistry::new();
        let mut a = TestPeer::spawn(1, &registry);
        let mut b = TestPeer::spawn(2, &registry);

        a.send("AUTH isma 1234").await;
        a.recv().await;
        a.recv().await;
        b.send("AUTH Ana 2512").await;
        b.recv().await;
        b.recv().await;
        assert_eq!(
            a.recv().await.as_deref(),
            Some("250 MSG server Ana se ha conectado")
        );

        b.send("QUIT").await;
        assert_eq!(b.recv().await.as_deref(), Some("221 BYE"));
        assert_eq!(a.recv().await.as_deref(), Some("250 MSG server Ana salió"));
        assert_eq!(registry.usernames().await, vec!["isma"]);
    }

    #[tokio::test]
    async fn test_end_session_is_idempotent() {
        let registry = SessionRegistry::new();
        assert!(end_session(&registry, ConnectionId::new(5)).await.is_none());
    }

    #[test]
    fn test_termination_reason_display() {
        assert_eq!(TerminationReason::Quit.to_string(), "quit");
        let reason = TerminationReason::Transport(TransportError::Io("reset".to_string()));
        assert!(reason.to_string().contains("reset"));
    }
}
