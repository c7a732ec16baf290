use crate::Address;

/// An `Envelope` collects the recipients of one mail transaction.
///
/// An envelope is returned by `Handler::mail` when a sender is accepted and is
/// dropped when the transaction ends with RSET or QUIT. Implementations can
/// reject recipients, the reason is sent back to the client with a 550 reply.
///
/// # Examples
/// ```
/// use smtpd::{Address, Envelope, RcptResult};
///
/// struct LocalOnly {
///     to: Vec<Address>,
/// }
///
/// impl Envelope for LocalOnly {
///     fn add_recipient(&mut self, rcpt: Address) -> RcptResult {
///         if rcpt.domain() == "example.com" {
///             self.to.push(rcpt);
///             RcptResult::Ok
///         } else {
///             RcptResult::Rejected("relay not permitted".to_owned())
///         }
///     }
/// }
/// ```
pub trait Envelope {
    /// Called for every RCPT command in the transaction
    fn add_recipient(&mut self, rcpt: Address) -> RcptResult;
}

/// `RcptResult` is the result of adding a recipient to an `Envelope`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RcptResult {
    /// Recipient accepted
    Ok,
    /// Recipient refused, the reason is relayed to the client
    Rejected(String),
}

/// An in-memory envelope that accepts every recipient
#[derive(Debug, Clone, Default)]
pub struct BasicEnvelope {
    recipients: Vec<Address>,
}

impl BasicEnvelope {
    /// Create an empty envelope
    pub fn new() -> Self {
        Self::default()
    }

    /// Recipients in the order they were added
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }
}

impl Envelope for BasicEnvelope {
    fn add_recipient(&mut self, rcpt: Address) -> RcptResult {
        self.recipients.push(rcpt);
        RcptResult::Ok
    }
}
