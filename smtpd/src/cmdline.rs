use thiserror::Error;

// Verbs that RFC 5321 s4.1.1 defines without an argument
const NO_ARGUMENT_VERBS: [&str; 3] = ["RSET", "DATA", "QUIT"];

/// Reasons a command line is rejected before it reaches the state machine
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyntaxError {
    /// The line was not terminated by `\r\n`
    #[error("line doesn't end in \\r\\n")]
    MissingCrlf,
    /// A verb that takes no argument was given one
    #[error("unexpected argument")]
    UnexpectedArgument,
}

/// A single line sent by the client, including its `\r\n` terminator.
///
/// ```
/// use smtpd::CommandLine;
///
/// let line = CommandLine::new("mail FROM:<ship@sea.com>  \r\n");
/// assert!(line.validate().is_ok());
/// assert_eq!(line.verb(), "MAIL");
/// assert_eq!(line.argument(), "FROM:<ship@sea.com>");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLine<'a> {
    line: &'a str,
}

impl<'a> CommandLine<'a> {
    /// Wrap a raw line
    pub fn new(line: &'a str) -> Self {
        Self { line }
    }

    /// Check the framing of the line and the no-argument rule
    pub fn validate(&self) -> Result<(), SyntaxError> {
        if !self.line.ends_with("\r\n") {
            return Err(SyntaxError::MissingCrlf);
        }
        let verb = self.verb();
        if NO_ARGUMENT_VERBS.contains(&verb.as_str()) && !self.argument().is_empty() {
            return Err(SyntaxError::UnexpectedArgument);
        }
        Ok(())
    }

    /// The command verb, uppercased
    pub fn verb(&self) -> String {
        match self.line.find(' ') {
            Some(idx) => self.line[..idx].to_ascii_uppercase(),
            None => self.unterminated().to_ascii_uppercase(),
        }
    }

    /// Everything after the verb, without the line ending or trailing whitespace
    pub fn argument(&self) -> &'a str {
        let line = self.unterminated();
        match line.find(' ') {
            Some(idx) => line[idx + 1..].trim_end(),
            None => "",
        }
    }

    fn unterminated(&self) -> &'a str {
        self.line.strip_suffix("\r\n").unwrap_or(self.line)
    }
}

//----- Tests ------------------------------------------------------------------
