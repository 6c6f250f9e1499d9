//! Client commands and the line parser that produces them.
//!
//! Parsing happens in two steps: [`CommandLine::parse`] splits a raw
//! line into an upper-cased verb and the untouched remainder, then
//! [`Command::from`] classifies the verb. There is no quoting or escaping;
//! message text is the literal remainder after the verb.

use std::fmt;

use thiserror::Error;

/// Errors in the arguments of an otherwise recognised command.
///
/// The `Display` text is sent verbatim as the detail of a `500 ERROR` reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// AUTH carried fewer than two tokens.
    #[error("Missing credentials")]
    MissingCredentials,

    /// AUTH carried more than two tokens (e.g. a password with a space).
    #[error("Malformed credentials")]
    MalformedCredentials,
}

/// A non-empty line split into verb and raw argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    verb: String,
    argument: &'a str,
}

impl<'a> CommandLine<'a> {
    /// Splits a raw line on its first space.
    ///
    /// Surrounding whitespace is trimmed first. Returns `None` for a blank
    /// line, which callers skip without replying.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        let (verb, argument) = line.split_once(' ').unwrap_or((line, ""));

        Some(Self {
            verb: verb.to_uppercase(),
            argument,
        })
    }

    /// The verb, upper-cased.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Everything after the first space; may be empty or contain spaces.
    pub fn argument(&self) -> &'a str {
        self.argument
    }
}

/// Username and password carried by an AUTH command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Splits an AUTH argument into exactly two space-separated tokens.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingCredentials` for fewer than two tokens
    /// - `ProtocolError::MalformedCredentials` for more than two
    pub fn parse(argument: &str) -> Result<Self, ProtocolError> {
        let mut tokens = argument.split(' ');
        let username = tokens.next().unwrap_or_default();
        let password = tokens.next().ok_or(ProtocolError::MissingCredentials)?;

        if tokens.next().is_some() {
            return Err(ProtocolError::MalformedCredentials);
        }

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// A classified client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AUTH <user> <pass>`
    Auth(Credentials),

    /// `AUTH` whose argument is not exactly two tokens.
    MalformedAuth(ProtocolError),

    /// `MSG <text>`; the text may be empty.
    Msg { text: String },

    /// `QUIT`; any argument is ignored.
    Quit,

    /// Any other verb.
    Unknown { verb: String },
}

impl Command {
    /// Parses a raw line; `None` means the line was blank.
    pub fn parse(raw: &str) -> Option<Self> {
        CommandLine::parse(raw).map(Self::from)
    }

    /// Builds an AUTH command.
    pub fn auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Auth(Credentials {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Builds a MSG command.
    pub fn msg(text: impl Into<String>) -> Self {
        Self::Msg { text: text.into() }
    }
}

impl From<CommandLine<'_>> for Command {
    fn from(line: CommandLine<'_>) -> Self {
        match line.verb() {
            "AUTH" => match Credentials::parse(line.argument()) {
                Ok(credentials) => Self::Auth(credentials),
                Err(e) => Self::MalformedAuth(e),
            },
            "MSG" => Self::Msg {
                text: line.argument().to_string(),
            },
            "QUIT" => Self::Quit,
            verb => Self::Unknown {
                verb: verb.to_string(),
            },
        }
    }
}

/// Encodes the command as a client line (without the trailing newline).
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(c) => write!(f, "AUTH {} {}", c.username, c.password),
            Self::MalformedAuth(_) => f.write_str("AUTH"),
            Self::Msg { text } => write!(f, "MSG {text}"),
            Self::Quit => f.write_str("QUIT"),
            Self::Unknown { verb } => f.write_str(verb),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines_are_skipped() {
        assert!(CommandLine::parse("").is_none());
        assert!(CommandLine::parse("   \t\r\n").is_none());
        assert!(Command::parse("\n").is_none());
    }

    #[test]
    fn test_verb_is_upper_cased_and_argument_kept_raw() {
        let line = CommandLine::parse("  msg hello   big  world \r\n").unwrap();
        assert_eq!(line.verb(), "MSG");
        assert_eq!(line.argument(), "hello   big  world");
    }

    #[test]
    fn test_verb_without_argument() {
        let line = CommandLine::parse("quit").unwrap();
        assert_eq!(line.verb(), "QUIT");
        assert_eq!(line.argument(), "");
    }

    #[test]
    fn test_auth_with_two_tokens() {
        assert_eq!(
            Command::parse("AUTH isma 1234"),
            Some(Command::auth("isma", "1234"))
        );
        assert_eq!(
            Command::parse("auth Ana 2512"),
            Some(Command::auth("Ana", "2512"))
        );
    }

    #[test]
    fn test_auth_missing_credentials() {
        assert_eq!(
            Command::parse("AUTH"),
            Some(Command::MalformedAuth(ProtocolError::MissingCredentials))
        );
        assert_eq!(
            Command::parse("AUTH isma"),
            Some(Command::MalformedAuth(ProtocolError::MissingCredentials))
        );
    }

    #[test]
    fn test_auth_password_with_space_is_malformed() {
        assert_eq!(
            Command::parse("AUTH isma 12 34"),
            Some(Command::MalformedAuth(ProtocolError::MalformedCredentials))
        );
        // A double space yields an empty token.
        assert_eq!(
            Command::parse("AUTH isma  1234"),
            Some(Command::MalformedAuth(ProtocolError::MalformedCredentials))
        );
    }

    #[test]
    fn test_msg_keeps_full_remainder() {
        assert_eq!(
            Command::parse("MSG hola a todos"),
            Some(Command::msg("hola a todos"))
        );
        assert_eq!(Command::parse("MSG"), Some(Command::msg("")));
    }

    #[test]
    fn test_quit_ignores_argument() {
        assert_eq!(Command::parse("QUIT"), Some(Command::Quit));
        assert_eq!(Command::parse("quit now please"), Some(Command::Quit));
    }

    #[test]
    fn test_unknown_verb() {
        assert_eq!(
            Command::parse("JOIN #rust"),
            Some(Command::Unknown {
                verb: "JOIN".to_string()
            })
        );
    }

    #[test]
    fn test_encode_client_lines() {
        assert_eq!(Command::auth("isma", "1234").to_string(), "AUTH isma 1234");
        assert_eq!(Command::msg("hola").to_string(), "MSG hola");
        assert_eq!(Command::Quit.to_string(), "QUIT");
    }

    #[test]
    fn test_protocol_error_detail_text() {
        assert_eq!(
            ProtocolError::MissingCredentials.to_string(),
            "Missing credentials"
        );
        assert_eq!(
            ProtocolError::MalformedCredentials.to_string(),
            "Malformed credentials"
        );
    }
}
