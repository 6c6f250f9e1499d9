//! chatline Protocol - Line-based wire protocol
//!
//! Every record is one newline-terminated UTF-8 line. Clients send
//! commands (`AUTH`, `MSG`, `QUIT`); the server answers with replies
//! prefixed by a three-digit status code.

pub mod command;
pub mod reply;

pub use command::{Command, CommandLine, Credentials, ProtocolError};
pub use reply::Reply;
