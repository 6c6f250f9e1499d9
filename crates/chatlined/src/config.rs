//! Server configuration.
//!
//! Values come from, in order of precedence: command-line flags (applied by
//! the binary), environment variables, then built-in defaults.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `CHATLINE_LISTEN` | listen address | `0.0.0.0:65432` |
//! | `CHATLINE_CREDENTIALS` | credential file | `<config_dir>/chatline/users.toml` if present |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::warn;

use chatline_core::{CredentialTable, DomainResult};

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:65432";

/// Environment variable overriding the listen address
pub const LISTEN_ENV: &str = "CHATLINE_LISTEN";

/// Environment variable pointing at a credential file
pub const CREDENTIALS_ENV: &str = "CHATLINE_CREDENTIALS";

/// Configuration for [`crate::server::ChatServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub listen_addr: SocketAddr,

    /// Credential file; `None` selects the built-in demo users.
    pub credentials_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            credentials_path: None,
        }
    }
}

impl ServerConfig {
    /// Builds a configuration from the environment.
    ///
    /// An unparseable `CHATLINE_LISTEN` is logged and ignored.
    pub fn from_env() -> Self {
        let listen_addr = match env::var(LISTEN_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                warn!(value = %value, error = %e, "Ignoring invalid {LISTEN_ENV}");
                default_listen_addr()
            }),
            Err(_) => default_listen_addr(),
        };

        let credentials_path = env::var_os(CREDENTIALS_ENV)
            .map(PathBuf::from)
            .or_else(default_credentials_path);

        Self {
            listen_addr,
            credentials_path,
        }
    }

    /// Loads the credential table this configuration points at.
    ///
    /// # Errors
    ///
    /// Propagates read and parse failures of the configured file.
    pub fn load_credentials(&self) -> DomainResult<CredentialTable> {
        match &self.credentials_path {
            Some(path) => CredentialTable::load(path),
            None => {
                warn!("No credential file configured, using built-in demo users");
                Ok(CredentialTable::builtin())
            }
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 65432))
}

/// `<config_dir>/chatline/users.toml`, only if the file exists.
fn default_credentials_path() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("chatline").join("users.toml"))
        .filter(|path| path.exists())
}
