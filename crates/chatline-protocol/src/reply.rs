//! Server replies and broadcasts.
//!
//! | Line | Meaning |
//! |---|---|
//! | `100 READY` | greeting on connect |
//! | `230 AUTH OK` / `430 AUTH FAIL` | AUTH result |
//! | `250 MSG <user> <text>` | chat line or system notice |
//! | `221 BYE` | acknowledges QUIT |
//! | `403 FORBIDDEN` | MSG before AUTH |
//! | `500 ERROR <detail>` | malformed AUTH or unknown verb |

use std::fmt;

use chatline_core::SERVER_USERNAME;

const MSG_PREFIX: &str = "250 MSG ";
const ERROR_PREFIX: &str = "500 ERROR ";

/// A line sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ready,
    AuthOk,
    AuthFail,
    /// Chat line, or a system notice when `user` is `server`.
    Message { user: String, text: String },
    Bye,
    Forbidden,
    Error { detail: String },
    /// A line this client does not recognise, kept verbatim.
    Other(String),
}

impl Reply {
    /// Chat line authored by `user`.
    pub fn message(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Message {
            user: user.into(),
            text: text.into(),
        }
    }

    /// System notice announcing that `username` joined.
    pub fn joined(username: impl fmt::Display) -> Self {
        Self::message(SERVER_USERNAME, format!("{username} se ha conectado"))
    }

    /// System notice announcing that `username` left.
    pub fn left(username: impl fmt::Display) -> Self {
        Self::message(SERVER_USERNAME, format!("{username} salió"))
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self::Error {
            detail: detail.into(),
        }
    }

    /// Decodes one server line (trailing newline already removed).
    ///
    /// Never fails: unrecognised lines come back as [`Reply::Other`].
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix(MSG_PREFIX) {
            let (user, text) = rest.split_once(' ').unwrap_or((rest, ""));
            return Self::message(user, text);
        }
        if let Some(detail) = line.strip_prefix(ERROR_PREFIX) {
            return Self::error(detail);
        }

        match line {
            "100 READY" => Self::Ready,
            "230 AUTH OK" => Self::AuthOk,
            "430 AUTH FAIL" => Self::AuthFail,
            "221 BYE" => Self::Bye,
            "403 FORBIDDEN" => Self::Forbidden,
            other => Self::Other(other.to_string()),
        }
    }

    /// Three-digit status code, if the line starts with one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Ready => Some(100),
            Self::AuthOk => Some(230),
            Self::AuthFail => Some(430),
            Self::Message { .. } => Some(250),
            Self::Bye => Some(221),
            Self::Forbidden => Some(403),
            Self::Error { .. } => Some(500),
            Self::Other(line) => line
                .split(' ')
                .next()
                .filter(|code| code.len() == 3)
                .and_then(|code| code.parse().ok()),
        }
    }

    /// True for any `221` line, which closes the session.
    pub fn is_goodbye(&self) -> bool {
        self.code() == Some(221)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("100 READY"),
            Self::AuthOk => f.write_str("230 AUTH OK"),
            Self::AuthFail => f.write_str("430 AUTH FAIL"),
            Self::Message { user, text } => write!(f, "{MSG_PREFIX}{user} {text}"),
            Self::Bye => f.write_str("221 BYE"),
            Self::Forbidden => f.write_str("403 FORBIDDEN"),
            Self::Error { detail } => write!(f, "{ERROR_PREFIX}{detail}"),
            Self::Other(line) => f.write_str(line),
        }
    }
}
