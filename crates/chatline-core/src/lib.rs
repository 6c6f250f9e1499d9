//! chatline Core - Shared domain types for the chat broadcaster
//!
//! This crate provides the identities and the credential table shared
//! between the server (chatlined), the wire protocol and the client.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod credentials;
pub mod error;
pub mod identity;

// Re-exports for convenience
pub use credentials::{CredentialStore, CredentialTable};
pub use error::{DomainError, DomainResult};
pub use identity::{ConnectionId, Username, SERVER_USERNAME};
