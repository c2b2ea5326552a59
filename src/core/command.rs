//! Parses a single client-supplied line into a [`Command`]: a verb plus
//! its argument tail.

/// An SMTP command: the uppercased verb token and the raw argument
/// tail that followed it on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: String,
    pub args: String,
}

impl Command {
    /// Parses `line` into a [`Command`].
    ///
    /// The caller is expected to have already stripped any trailing
    /// CRLF. Splits at the *first* space only; everything after it is
    /// kept verbatim as `args` (no trimming). The verb is upper-cased.
    /// An empty line yields an empty verb and empty args, which the
    /// dispatcher treats as unrecognised.
    pub fn parse(line: &str) -> Command {
        match line.split_once(' ') {
            Some((head, tail)) => Command {
                verb: head.to_uppercase(),
                args: tail.to_string(),
            },
            None => Command {
                verb: line.to_uppercase(),
                args: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_yields_empty_command() {
        let command = Command::parse("");
        assert_eq!(command.verb, "");
        assert_eq!(command.args, "");
    }

    #[test]
    fn verb_only_yields_empty_args() {
        let command = Command::parse("QUIT");
        assert_eq!(command.verb, "QUIT");
        assert_eq!(command.args, "");
    }

    #[test]
    fn splits_on_first_space_only() {
        let command = Command::parse("AUTH PLAIN");
        assert_eq!(command.verb, "AUTH");
        assert_eq!(command.args, "PLAIN");
    }

    #[test]
    fn lower_case_verb_is_uppercased() {
        let command = Command::parse("foo bar baz");
        assert_eq!(command.verb, "FOO");
        assert_eq!(command.args, "bar baz");
    }

    #[test]
    fn args_are_kept_verbatim_without_trimming() {
        let command = Command::parse("MAIL  FROM:<a@b.com>");
        assert_eq!(command.verb, "MAIL");
        assert_eq!(command.args, " FROM:<a@b.com>");
    }
}
