//! Type-safe identifiers for connections and chat users.

use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Name used as the author of join/leave notices.
pub const SERVER_USERNAME: &str = "server";

/// Unique identifier for one accepted connection.
///
/// Assigned by the acceptor from a monotonically increasing counter,
/// so two live connections never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Name a session is bound to after a successful AUTH.
///
/// A username travels as a single space-separated token on the wire,
/// so it can never be empty or contain whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Creates a username, rejecting values that could not appear as
    /// a single protocol token.
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidUsername { value: name });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
