//! The SMTP reply model: a status code plus one or more human-readable
//! lines, and the wire formatting rules that turn them into bytes.
//!
//! See rfc5321 §4.2 for the multi-line reply grammar this module
//! implements.

/// Line terminator used between reply lines on the wire.
const LINE_END: &str = "\r\n";

/// A single SMTP reply: a three-digit status code plus an ordered,
/// non-empty-by-convention sequence of text lines.
///
/// A `Reply` with zero text lines is a supported degenerate case (see
/// [`Reply::format`]) kept for compatibility with callers that only
/// want the bare numeric acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    /// Builds a reply from a status code and zero or more text lines.
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Reply { code, lines }
    }

    /// The three-digit SMTP status code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// The reply's text lines, in order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Formats the reply into its wire representation: one `String` per
    /// line, ready to be written to the client as-is.
    ///
    /// If there are no text lines, emits a single bare `<code>\n` line
    /// (no CRLF, no trailing text) — a historical degenerate form some
    /// callers rely on for a pure numeric acknowledgement. Otherwise,
    /// lines before the last use a hyphen continuation (`<code>-text`)
    /// and the last line uses a space (`<code> text`); every line ends
    /// in CRLF.
    pub fn format(&self) -> Vec<String> {
        if self.lines.is_empty() {
            return vec![format!("{}\n", self.code)];
        }

        let last = self.lines.len() - 1;
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let sep = if i == last { ' ' } else { '-' };
                format!("{}{}{}{}", self.code, sep, line, LINE_END)
            })
            .collect()
    }
}

/// Welcome banner sent immediately after a connection is accepted.
pub fn service_ready(identification: impl Into<String>) -> Reply {
    Reply::new(220, vec![identification.into()])
}

/// Sent in response to `QUIT`.
pub fn bye() -> Reply {
    Reply::new(221, vec!["Bye".to_string()])
}

/// Successful authentication, exposed for scenes to use on completion.
pub fn auth_ok() -> Reply {
    Reply::new(235, vec!["Authenticate successful".to_string()])
}

/// Generic success reply. `messages` becomes the reply's text lines; an
/// empty `Vec` is replaced with a single `"Ok"` line, *except* callers
/// that explicitly want the empty-line-on-success form (e.g. `RSET`)
/// should pass a single empty string rather than no lines at all.
pub fn ok(messages: Vec<String>) -> Reply {
    let lines = if messages.is_empty() {
        vec!["Ok".to_string()]
    } else {
        messages
    };
    Reply::new(250, lines)
}

/// `500 Unrecognised command`.
pub fn unrecognised_command() -> Reply {
    Reply::new(500, vec!["Unrecognised command".to_string()])
}

/// `502 Command not implemented`.
pub fn command_not_implemented() -> Reply {
    Reply::new(502, vec!["Command not implemented".to_string()])
}

/// `500 Line too long.` — note the trailing period, preserved for
/// compatibility with existing clients that match on this exact text.
pub fn line_too_long() -> Reply {
    Reply::new(500, vec!["Line too long.".to_string()])
}

/// `334` prompt used by scenes mid-authentication-dialog.
pub fn auth_credentials(prompt: impl Into<String>) -> Reply {
    Reply::new(334, vec![prompt.into()])
}

/// `535 Authenticate failed` (or a scene-supplied message).
pub fn auth_failed(message: impl Into<String>) -> Reply {
    let message = message.into();
    let message = if message.is_empty() {
        "Authenticate failed".to_string()
    } else {
        message
    };
    Reply::new(535, vec![message])
}

/// `550` mailbox-unavailable reply, used for MAIL/RCPT parse failures.
pub fn mailbox_unavailable(message: impl Into<String>) -> Reply {
    Reply::new(550, vec![message.into()])
}

/// `552` exceeded-storage reply, used for receiver caps and storage
/// backend failures.
pub fn exceeded_storage(message: impl Into<String>) -> Reply {
    Reply::new(552, vec![message.into()])
}

/// `354 End data with <CR><LF>.<CR><LF>` — begins the DATA phase.
pub fn mail_data() -> Reply {
    Reply::new(354, vec!["End data with <CR><LF>.<CR><LF>".to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_single_line_reply_with_space_separator() {
        let reply = bye();
        assert_eq!(reply.format(), vec!["221 Bye\r\n".to_string()]);
    }

    #[test]
    fn formats_multiline_reply_with_hyphen_then_space() {
        let reply = ok(vec!["foo".into(), "BAR".into(), "baz".into()]);
        let lines = reply.format();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "250-foo\r\n");
        assert_eq!(lines[1], "250-BAR\r\n");
        assert_eq!(lines[2], "250 baz\r\n");
    }

    #[test]
    fn empty_lines_reply_formats_to_bare_code() {
        let reply = Reply::new(250, vec![]);
        assert_eq!(reply.format(), vec!["250\n".to_string()]);
    }

    #[test]
    fn rset_style_single_empty_line_formats_with_trailing_space() {
        let reply = Reply::new(250, vec![String::new()]);
        assert_eq!(reply.format(), vec!["250 \r\n".to_string()]);
    }

    #[test]
    fn ok_defaults_to_single_ok_line() {
        let reply = ok(vec![]);
        assert_eq!(reply.lines(), &["Ok".to_string()]);
    }

    #[test]
    fn auth_failed_defaults_message_when_empty() {
        let reply = auth_failed("");
        assert_eq!(reply.lines(), &["Authenticate failed".to_string()]);
    }
}
