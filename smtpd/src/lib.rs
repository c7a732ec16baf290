//! A library for building smtp servers.
//!
//! The library supplies a command line parser and an SMTP state machine. The
//! user of the library supplies I/O code and a `Handler` implementation that
//! decides whether to accept connections, senders and recipients.
//!
//! The code using the library sends each line received from a client,
//! including its `\r\n` ending, to `Session::process()`. After consulting the
//! `Handler`, the session returns a `Response` to send back to the client.
//!
//! Message bodies are not read by the session. DATA is answered with a 354
//! continuation and following lines are treated as commands.
//!
//! # Pseudo Code
//! ```rust,ignore
//! // Create a handler which will control the SMTP session
//! let handler = create_handler();
//!
//! // Create a SMTP session when a new client connects
//! let mut session = SessionBuilder::new("mailserver_name").build(client_addr, handler);
//!
//! // Greet the client, unless the handler rejected the connection
//! let greeting = session.greeting();
//! write_response(tcp_connection, &greeting)?;
//!
//! // Read a line from the client and send it to the session
//! let line = read_line(tcp_connection);
//! let res = session.process(line);
//!
//! // Act on the response
//! match res.action {
//!     Action::Reply => {
//!         write_response(tcp_connection, &res)?;
//!     }
//!     Action::Close => {
//!         write_response(tcp_connection, &res)?;
//!         close(tcp_connection);
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![forbid(missing_docs)]

mod address;
mod cmdline;
mod envelope;
mod parser;
mod response;
mod session;
mod state;

pub use crate::address::Address;
pub use crate::cmdline::{CommandLine, SyntaxError};
pub use crate::envelope::{BasicEnvelope, Envelope, RcptResult};
pub use crate::response::{Action, Response};
pub use crate::session::{
    Connection, Session, SessionBuilder, DEFAULT_SIZE_LIMIT, MAX_LINE_LENGTH,
};
pub use crate::state::{Hello, HelloKind};

/// A `Handler` makes decisions about incoming connections and mail.
///
/// A Handler implementation must be provided by code using the library. A
/// separate handler instance is used for each connection.
///
/// Connections are accepted by default. Without an implementation of
/// `mail()` every MAIL command is answered with a temporary failure.
///
/// # Examples
/// ```
/// # use smtpd::{Address, BasicEnvelope, ConnectResult, Connection, Handler, MailResult};
/// struct MyHandler {}
///
/// impl Handler for MyHandler {
///     fn connect(&mut self, conn: &Connection) -> ConnectResult {
///         if conn.remote_addr().ip().is_loopback() {
///             ConnectResult::Ok
///         } else {
///             ConnectResult::Reject
///         }
///     }
///
///     fn mail(&mut self, _conn: &Connection, from: Address) -> MailResult {
///         if from.domain() == "this.is.spam.com" {
///             MailResult::Rejected("go away".to_owned())
///         } else {
///             MailResult::Ok(Box::new(BasicEnvelope::new()))
///         }
///     }
/// }
/// ```
pub trait Handler {
    /// Called when a client connects, before the greeting is sent
    fn connect(&mut self, _conn: &Connection) -> ConnectResult {
        ConnectResult::Ok
    }

    /// Called when a MAIL command starts a new transaction
    fn mail(&mut self, _conn: &Connection, _from: Address) -> MailResult {
        MailResult::NotConfigured
    }
}

/// A `Handler` that accepts every connection and sender.
///
/// Recipients are collected in a `BasicEnvelope`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllHandler;

impl Handler for AcceptAllHandler {
    fn mail(&mut self, _conn: &Connection, _from: Address) -> MailResult {
        MailResult::Ok(Box::new(BasicEnvelope::new()))
    }
}

//------ Results of Handler calls ----------------------------------------------

/// `ConnectResult` is the result of a new client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectResult {
    /// Greet the client
    Ok,
    /// Close the connection without a greeting
    Reject,
}

/// `MailResult` is the result of an smtp MAIL command
pub enum MailResult {
    /// Sender accepted, recipients will be added to the given envelope
    Ok(Box<dyn Envelope>),
    /// Sender refused, the reason is sent to the client with a 550 reply
    Rejected(String),
    /// No mail policy has been set up
    NotConfigured,
}
