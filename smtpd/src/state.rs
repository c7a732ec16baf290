use crate::Envelope;
use std::fmt;

/// The greeting command used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloKind {
    /// Plain SMTP, HELO
    Helo,
    /// Extended SMTP, EHLO
    Ehlo,
}

impl HelloKind {
    /// The verb as sent on the wire
    pub fn verb(self) -> &'static str {
        match self {
            HelloKind::Helo => "HELO",
            HelloKind::Ehlo => "EHLO",
        }
    }
}

/// What the client announced in its last HELO or EHLO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// HELO or EHLO
    pub kind: HelloKind,
    /// The hostname given by the client
    pub host: String,
}

// The mail transaction in progress, if any
pub(crate) enum State {
    Idle,
    Mail(Box<dyn Envelope>),
}

impl State {
    pub(crate) fn in_transaction(&self) -> bool {
        matches!(self, State::Mail(_))
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Mail(_) => write!(f, "Mail{{..}}"),
        }
    }
}
