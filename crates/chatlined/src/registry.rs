//! Registry of live, authenticated sessions.
//!
//! The registry maps each connection to the writer the broadcaster uses to
//! reach it. A session is present exactly while it is authenticated and its
//! connection has not been torn down.
//!
//! # Locking
//!
//! ```text
//!  session task ──register/rebind/unregister──┐
//!                                             ▼
//!                               Mutex<HashMap<ConnectionId, RegisteredSession>>
//!                                             │
//!  broadcaster ──────snapshot (clone, release)┘──▶ write to each peer
//! ```
//!
//! Every operation takes the same exclusive lock and releases it before
//! returning. No transport I/O happens while the lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use chatline_core::{ConnectionId, Username};

use crate::transport::LineWriter;

/// A registry entry: who the connection is and how to reach it.
#[derive(Clone)]
pub struct RegisteredSession {
    pub id: ConnectionId,
    pub username: Username,
    pub writer: LineWriter,
    pub joined_at: DateTime<Utc>,
}

impl RegisteredSession {
    pub fn new(id: ConnectionId, username: Username, writer: LineWriter) -> Self {
        Self {
            id,
            username,
            writer,
            joined_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for RegisteredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSession")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("joined_at", &self.joined_at)
            .finish_non_exhaustive()
    }
}

/// Shared handle to the session registry.
///
/// Cheap to clone; all clones see the same map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<ConnectionId, RegisteredSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session keyed by its connection id.
    ///
    /// # Errors
    ///
    /// - `RegistryError::DuplicateSession` if the id is already registered
    pub async fn register(&self, session: RegisteredSession) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;

        if sessions.contains_key(&session.id) {
            return Err(RegistryError::DuplicateSession(session.id));
        }

        debug!(
            connection = %session.id,
            username = %session.username,
            "Session registered"
        );
        sessions.insert(session.id, session);
        Ok(())
    }

    /// Rebinds a registered connection to a new username.
    ///
    /// Returns the previous username.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionNotFound` if the id is not registered
    pub async fn rebind(
        &self,
        id: ConnectionId,
        username: Username,
    ) -> Result<Username, RegistryError> {
        let mut sessions = self.sessions.lock().await;

        let session = sessions
            .get_mut(&id)
            .ok_or(RegistryError::SessionNotFound(id))?;

        debug!(
            connection = %id,
            from = %session.username,
            to = %username,
            "Session rebound"
        );
        Ok(std::mem::replace(&mut session.username, username))
    }

    /// Removes a session, returning it if it was present.
    ///
    /// Idempotent: removing an absent id is a no-op.
    pub async fn unregister(&self, id: ConnectionId) -> Option<RegisteredSession> {
        let removed = self.sessions.lock().await.remove(&id);
        if let Some(ref session) = removed {
            debug!(
                connection = %id,
                username = %session.username,
                "Session unregistered"
            );
        }
        removed
    }

    /// Point-in-time copy of every registered session.
    pub async fn snapshot(&self) -> Vec<RegisteredSession> {
        self.sessions.lock().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.lock().await.contains_key(&id)
    }

    /// Usernames of all registered sessions, sorted.
    pub async fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sessions
            .lock()
            .await
            .values()
            .map(|s| s.username.to_string())
            .collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The connection is already registered.
    #[error("session already registered: {0}")]
    DuplicateSession(ConnectionId),

    /// The connection is not registered.
    #[error("session not found: {0}")]
    SessionNotFound(ConnectionId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn create_test_session(id: u64, name: &str) -> RegisteredSession {
        let (_client, server) = duplex(64);
        RegisteredSession::new(
            ConnectionId::new(id),
            Username::new(name).unwrap(),
            LineWriter::new(server),
        )
    }

    #[tokio::test]
    async fn test_register_and_snapshot() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty().await);

        registry.register(create_test_session(1, "isma")).await.unwrap();
        registry.register(create_test_session(2, "Ana")).await.unwrap();

        assert_eq!(registry.len().await, 2);
        assert!(registry.contains(ConnectionId::new(1)).await);
        assert_eq!(registry.usernames().await, vec!["Ana", "isma"]);

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let registry = SessionRegistry::new();
        registry.register(create_test_session(1, "isma")).await.unwrap();

        let err = registry
            .register(create_test_session(1, "Ana"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSession(id) if id == ConnectionId::new(1)));
        assert_eq!(registry.usernames().await, vec!["isma"]);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.register(create_test_session(1, "isma")).await.unwrap();

        let removed = registry.unregister(ConnectionId::new(1)).await;
        assert_eq!(removed.map(|s| s.username.to_string()), Some("isma".to_string()));
        assert!(registry.unregister(ConnectionId::new(1)).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_rebind() {
        let registry = SessionRegistry::new();
        registry.register(create_test_session(1, "isma")).await.unwrap();

        let previous = registry
            .rebind(ConnectionId::new(1), Username::new("Ana").unwrap())
            .await
            .unwrap();
        assert_eq!(previous.as_str(), "isma");
        assert_eq!(registry.usernames().await, vec!["Ana"]);
        assert_eq!(registry.len().await, 1);

        let err = registry
            .rebind(ConnectionId::new(9), Username::new("Kevin").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_later_changes() {
        let registry = SessionRegistry::new();
        registry.register(create_test_session(1, "isma")).await.unwrap();

        let snapshot = registry.snapshot().await;
        registry.unregister(ConnectionId::new(1)).await;

        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = SessionRegistry::new();

        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .register(create_test_session(i, &format!("user{i}")))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(registry.len().await, 32);
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::DuplicateSession(ConnectionId::new(3));
        assert!(err.to_string().contains("conn-3"));
    }
}
