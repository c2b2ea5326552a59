//! Address parsing and message-id generation.
//!
//! The protocol engine delegates these two concerns to this module
//! rather than implementing them inline. This parser is intentionally
//! simple: it extracts the address from a `<...>` bracketed mailbox
//! path, or falls back to a bare address, and does not attempt full
//! rfc5321 mailbox grammar.

use std::fmt;

/// An error produced while parsing a mailbox path out of a `MAIL`/`RCPT`
/// argument tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxError(String);

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MailboxError {}

/// Extracts the mailbox address from a path argument such as
/// `<user@example.com>` or a bare `user@example.com`.
///
/// Performs a simple bracket search first, falling back to treating
/// the whole trimmed input as the address if no brackets are present.
/// Returns an error if the result doesn't look like a mailbox (empty,
/// or missing `@`).
pub fn parse_mailbox(input: &str) -> Result<String, MailboxError> {
    let candidate = match (input.find('<'), input.find('>')) {
        (Some(start), Some(end)) if start < end => &input[start + 1..end],
        _ => input.trim(),
    };

    if candidate.is_empty() || !candidate.contains('@') {
        return Err(MailboxError(format!(
            "not a valid mailbox address: {:?}",
            input
        )));
    }

    log::debug!("parsed mailbox address: {}", candidate);
    Ok(candidate.to_string())
}

/// Generates a fresh, unique message id for a new envelope.
pub fn generate_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bracketed_address() {
        assert_eq!(parse_mailbox("<user@example.com>").unwrap(), "user@example.com");
    }

    #[test]
    fn parses_bare_address() {
        assert_eq!(parse_mailbox("user@example.com").unwrap(), "user@example.com");
    }

    #[test]
    fn rejects_address_without_at_sign() {
        assert!(parse_mailbox("<not-an-address>").is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_mailbox("").is_err());
        assert!(parse_mailbox("<>").is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_message_id();
        let b = generate_message_id();
        assert_ne!(a, b);
    }
}
