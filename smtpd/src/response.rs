use log::trace;
use std::fmt;
use std::io;
use std::io::Write;

//------ Responses -------------------------------------------------------------

pub(crate) const CONNECTION_REJECTED: Response = Response::close_silently();
pub(crate) const GOODBYE: Response =
    Response::constant(221, "2.0.0 Bye", false, Action::Close);
pub(crate) const OK: Response = Response::constant(250, "2.0.0 OK", false, Action::Reply);
pub(crate) const ADDRESS_OK: Response =
    Response::constant(250, "2.1.0 Ok", false, Action::Reply);
pub(crate) const START_DATA: Response = Response::constant(354, "Go ahead", false, Action::Reply);
pub(crate) const MAIL_NOT_CONFIGURED: Response = Response::constant(
    451,
    "4.3.0 Error: new mail handler not configured",
    true,
    Action::Reply,
);
pub(crate) const INVALID_UTF8: Response =
    Response::constant(500, "line is not valid UTF-8", true, Action::Reply);
pub(crate) const LINE_TOO_LONG: Response =
    Response::constant(500, "5.5.6 Error: line too long", true, Action::Close);
pub(crate) const BAD_SENDER: Response = Response::constant(
    501,
    "5.1.7 Bad sender address syntax",
    true,
    Action::Reply,
);
pub(crate) const BAD_RECIPIENT: Response = Response::constant(
    501,
    "5.1.3 Bad recipient address syntax",
    true,
    Action::Reply,
);
pub(crate) const UNRECOGNIZED: Response = Response::constant(
    502,
    "5.5.2 Error: command not recognized",
    true,
    Action::Reply,
);
pub(crate) const NESTED_MAIL: Response = Response::constant(
    503,
    "5.5.1 Error: nested MAIL command",
    true,
    Action::Reply,
);
pub(crate) const NEED_MAIL: Response = Response::constant(
    503,
    "5.5.1 Error: need MAIL command",
    true,
    Action::Reply,
);

//------ Types -----------------------------------------------------------------

/// Response contains a code and message to be sent back to the client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// The three digit response code
    pub code: u16,
    message: Message,
    /// Is the response an error response?
    pub is_error: bool,
    /// The action to take after sending the response to the client
    pub action: Action,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Message {
    // First line followed by continuation lines
    Dynamic(String, Vec<String>),
    Fixed(&'static str),
    Empty,
}

/// Action indicates the recommended action to take on a response
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Action {
    /// Send the response and close the connection
    Close,
    /// Send a reply and keep the connection open
    Reply,
}

impl Response {
    // A response that can be used in const definitions
    pub(crate) const fn constant(
        code: u16,
        message: &'static str,
        is_error: bool,
        action: Action,
    ) -> Self {
        Self {
            code,
            message: Message::Fixed(message),
            is_error,
            action,
        }
    }

    // Close the connection without writing anything
    pub(crate) const fn close_silently() -> Self {
        Self {
            code: 0,
            message: Message::Empty,
            is_error: true,
            action: Action::Close,
        }
    }

    // A single line response built at runtime
    pub(crate) fn new(code: u16, message: String) -> Self {
        Self::multiline(code, message, Vec::new())
    }

    // A response that is built dynamically and can be a multiline response
    pub(crate) fn multiline(code: u16, head: String, tail: Vec<String>) -> Self {
        Self {
            code,
            message: Message::Dynamic(head, tail),
            is_error: !(200..400).contains(&code),
            action: Action::Reply,
        }
    }

    /// The lines of the response, without codes or line endings
    pub fn lines(&self) -> Vec<&str> {
        match &self.message {
            Message::Dynamic(head, tail) => std::iter::once(head.as_str())
                .chain(tail.iter().map(String::as_str))
                .collect(),
            Message::Fixed(s) => vec![s],
            Message::Empty => Vec::new(),
        }
    }

    /// Write the response to the given writer
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        let lines = self.lines();
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            let sep = if i < last { '-' } else { ' ' };
            write!(out, "{}{}{}\r\n", self.code, sep, line)?;
        }
        Ok(())
    }

    // Log the response
    pub(crate) fn log(&self) {
        match self.message {
            Message::Empty => (),
            _ => trace!("< {}", self),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = Vec::new();
        self.write_to(&mut buf).map_err(|_| fmt::Error)?;
        write!(f, "{}", String::from_utf8_lossy(&buf).trim_end())
    }
}

// Reasons supplied by a Handler must not be able to inject extra reply lines
pub(crate) fn one_line(reason: &str) -> String {
    reason.replace(['\r', '\n'], " ")
}

//----- Tests ------------------------------------------------------------------
