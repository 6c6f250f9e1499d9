//! Domain-specific error types following panic-free policy.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone)]
pub enum DomainError {
    /// Username is empty or contains whitespace
    #[error("Invalid username: {value:?} (expected a non-empty name without whitespace)")]
    InvalidUsername { value: String },

    /// Credential file could not be read
    #[error("Failed to read credentials from {path}: {reason}")]
    CredentialIo { path: PathBuf, reason: String },

    /// Credential file content is not a valid credential table
    #[error("Failed to parse credentials: {reason}")]
    CredentialParse { reason: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
