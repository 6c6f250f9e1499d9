//! Static credential table and the lookup capability handed to the server.
//!
//! The table is loaded once at startup and never mutated afterwards. The
//! server only ever sees it through [`CredentialStore`], which answers a
//! single question: does this username/password pair match exactly?
//!
//! # File Format
//!
//! ```toml
//! [users]
//! isma = "1234"
//! Ana = "2512"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{DomainError, DomainResult};
use crate::identity::Username;

/// Users shipped with the server when no credential file is configured.
const BUILTIN_USERS: &[(&str, &str)] = &[
    ("isma", "1234"),
    ("Ana", "2512"),
    ("Kevin", "4343"),
    ("Gibran", "sexoplus"),
    ("Lalo", "123"),
    ("Bri", "Bri2"),
];

/// Read-only credential lookup.
///
/// Implementations must be safe to share across every session task.
pub trait CredentialStore: Send + Sync {
    /// Returns true only if `username` exists and its stored password
    /// equals `password` exactly (case-sensitive).
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// On-disk shape of a credential file.
#[derive(Debug, Deserialize)]
struct CredentialFile {
    users: HashMap<String, String>,
}

/// Mapping from username to password.
#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    users: HashMap<Username, String>,
}

impl CredentialTable {
    /// Builds a table from username/password pairs.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidUsername` if a name is empty or
    /// contains whitespace.
    pub fn from_pairs<I, U, P>(pairs: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        let mut users = HashMap::new();
        for (user, password) in pairs {
            let username = Username::new(user)?;
            let password = password.into();
            if password.contains(' ') {
                // AUTH splits on spaces, so this user can never log in.
                warn!(username = %username, "Password contains a space and cannot be used");
            }
            users.insert(username, password);
        }
        Ok(Self { users })
    }

    /// The demo users the server falls back to without a credential file.
    pub fn builtin() -> Self {
        let users = BUILTIN_USERS
            .iter()
            .filter_map(|(user, password)| {
                Username::new(*user)
                    .ok()
                    .map(|name| (name, (*password).to_string()))
            })
            .collect();
        Self { users }
    }

    /// Parses a TOML credential table.
    ///
    /// # Errors
    ///
    /// - `DomainError::CredentialParse` on invalid TOML or a missing `[users]` table
    /// - `DomainError::InvalidUsername` for unusable names
    pub fn from_toml_str(content: &str) -> DomainResult<Self> {
        let file: CredentialFile =
            toml::from_str(content).map_err(|e| DomainError::CredentialParse {
                reason: e.to_string(),
            })?;
        Self::from_pairs(file.users)
    }

    /// Reads and parses a TOML credential file.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CredentialIo` if the file cannot be read, and
    /// any error from [`CredentialTable::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DomainError::CredentialIo {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for CredentialTable {
    fn verify(&self, username: &str, password: &str) -> bool {
        let Ok(name) = Username::new(username) else {
            return false;
        };
        self.users
            .get(&name)
            .is_some_and(|stored| stored == password)
    }
}
