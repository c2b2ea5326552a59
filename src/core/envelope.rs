//! The in-progress SMTP transaction: sender, recipients and raw body,
//! independent of whatever headers live inside the body itself.

use crate::message;
use std::fmt;

/// Error returned by [`Envelope::set_origin`] if the accumulated body
/// cannot be stored on the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeError(pub String);

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EnvelopeError {}

/// The envelope being assembled for the current mail transaction.
///
/// Created fresh on every engine reset (construction, `RSET`, and after
/// a completed `DATA` phase). `helo` and `from` may each be set at most
/// meaningfully once per transaction; `to` is append-only until the
/// next reset.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    /// Unique id assigned when this envelope was created.
    pub id: String,
    /// The identity string supplied via `HELO`/`EHLO`, if any.
    pub helo: String,
    /// The reverse path (`MAIL FROM` sender mailbox), if set.
    pub from: Option<String>,
    /// The ordered list of forward paths (`RCPT TO` recipients).
    pub to: Vec<String>,
    /// The raw body bytes accumulated during `DATA`, with dot-stuffing
    /// already reversed and the terminator already stripped.
    pub body: String,
}

impl Envelope {
    /// Builds a fresh envelope with a newly generated id and otherwise
    /// empty fields.
    pub fn new() -> Self {
        Envelope {
            id: message::generate_message_id(),
            helo: String::new(),
            from: None,
            to: Vec::new(),
            body: String::new(),
        }
    }

    /// Stores the raw, already-unescaped DATA body on this envelope.
    ///
    /// Kept fallible to mirror the upstream protocol's `SetOrigin` step
    /// (spec step between DATA-terminator detection and invoking the
    /// message-received callback); this implementation has no body
    /// validation of its own and always succeeds.
    pub fn set_origin(&mut self, raw: String) -> Result<(), EnvelopeError> {
        self.body = raw;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_envelope_has_fresh_id_and_empty_fields() {
        let envelope = Envelope::new();
        assert!(!envelope.id.is_empty());
        assert_eq!(envelope.helo, "");
        assert_eq!(envelope.from, None);
        assert!(envelope.to.is_empty());
        assert_eq!(envelope.body, "");
    }

    #[test]
    fn successive_envelopes_get_distinct_ids() {
        let a = Envelope::new();
        let b = Envelope::new();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn set_origin_stores_raw_body() {
        let mut envelope = Envelope::new();
        envelope.set_origin("hello\r\n".to_string()).unwrap();
        assert_eq!(envelope.body, "hello\r\n");
    }
}
