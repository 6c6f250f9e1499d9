//! Error types for the chatline client.

use std::io;
use thiserror::Error;

/// Client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to connect to the server.
    ///
    /// Usually means the server is not running or the address is wrong.
    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// The server closed the connection before the exchange finished.
    #[error("Connection closed by server")]
    ServerClosed,

    /// AUTH was answered with anything other than `230`.
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// Reading from or writing to the connection failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let err = ClientError::Connect {
            addr: "127.0.0.1:65432".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1:65432"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_from_io_error() {
        let err: ClientError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
