//! Rendering of server lines for the console.

use chatline_protocol::Reply;

/// Formats a server reply for display.
///
/// Broadcasts become `[<user>] <text>`; every other line is shown verbatim.
pub fn render(reply: &Reply) -> String {
    match reply {
        Reply::Message { user, text } => format!("[{user}] {text}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_broadcast() {
        assert_eq!(render(&Reply::parse("250 MSG isma hola a todos")), "[isma] hola a todos");
        assert_eq!(
            render(&Reply::parse("250 MSG server Ana se ha conectado")),
            "[server] Ana se ha conectado"
        );
        assert_eq!(render(&Reply::parse("250 MSG isma")), "[isma] ");
    }

    #[test]
    fn test_render_other_lines_verbatim() {
        assert_eq!(render(&Reply::parse("403 FORBIDDEN")), "403 FORBIDDEN");
        assert_eq!(render(&Reply::parse("221 BYE")), "221 BYE");
        assert_eq!(render(&Reply::parse("999 whatever")), "999 whatever");
    }
}
