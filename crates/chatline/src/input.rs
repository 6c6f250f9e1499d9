//! Console input handling.
//!
//! Console reads block, so they run on a detached OS thread that feeds a
//! channel. Runtime shutdown never waits on that thread.

use std::io::BufRead;
use std::thread;

use chatline_protocol::Command;
use tokio::sync::mpsc;
use tracing::debug;

/// Console command that leaves the chat.
const QUIT_INPUT: &str = "/quit";

/// Lines buffered between the console thread and the async side
const CONSOLE_CHANNEL_CAPACITY: usize = 16;

/// Reads `source` line by line on its own thread.
///
/// The returned receiver yields each line without its terminator and
/// closes at end-of-input, on a read error, or once nothing is left to
/// receive.
pub fn spawn_line_reader<S>(source: S) -> mpsc::Receiver<String>
where
    S: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CONSOLE_CHANNEL_CAPACITY);

    thread::spawn(move || {
        for line in source.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!(error = %e, "Console read failed");
                    break;
                }
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    rx
}

/// What to do with one line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Send the text as a chat message.
    Send(String),
    /// Leave the chat.
    Quit,
}

impl InputAction {
    /// Interprets a console line. Blank lines yield `None`.
    pub fn from_line(line: &str) -> Option<Self> {
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        if text.eq_ignore_ascii_case(QUIT_INPUT) {
            return Some(Self::Quit);
        }
        Some(Self::Send(text.to_string()))
    }

    /// The protocol command this action sends.
    pub fn to_command(&self) -> Command {
        match self {
            Self::Send(text) => Command::msg(text.as_str()),
            Self::Quit => Command::Quit,
        }
    }
}
