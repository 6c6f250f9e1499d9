//! chatline Daemon - Session registry and broadcast server
//!
//! This crate provides the core infrastructure for the chat server:
//! - `transport` - Newline-delimited line reader/writer
//! - `registry` - Shared registry of authenticated sessions
//! - `broadcast` - Delivery of one line to every registered session
//! - `server` - TCP acceptor and per-connection session state machine
//! - `config` - Listen address and credential source
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       chatlined                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │────▶│     SessionRegistry         │   │
//! │  │ (TcpListener)   │     │  (Mutex<HashMap<..>>)       │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ snapshot          │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ SessionHandler  │────▶│        Broadcaster          │   │
//! │  │  (per client)   │     │   (write to every peer)     │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - A failure in one session never affects another

pub mod broadcast;
pub mod config;
pub mod registry;
pub mod server;
pub mod transport;
