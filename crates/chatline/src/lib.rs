//! chatline client - Library modules
//!
//! Building blocks for the interactive console client:
//!
//! 1. **Connection**: connects, reads the greeting and authenticates
//! 2. **Receiver Task**: prints server lines while the user types
//! 3. **Input**: turns console lines into protocol commands
//!
//! The receiver respects a `CancellationToken` so the binary can stop it
//! when the user leaves.

pub mod client;
pub mod error;
pub mod input;
pub mod render;

// Re-export commonly used types
pub use client::{receive_loop, ChatConnection, ClientConfig, MessageSender, ReceiverExit};
pub use error::{ClientError, Result};
pub use input::{spawn_line_reader, InputAction};
