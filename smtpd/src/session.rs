use crate::cmdline::CommandLine;
use crate::parser::{forward_path, reverse_path};
use crate::response::{
    one_line, ADDRESS_OK, BAD_RECIPIENT, BAD_SENDER, CONNECTION_REJECTED, GOODBYE,
    INVALID_UTF8, LINE_TOO_LONG, MAIL_NOT_CONFIGURED, NEED_MAIL, NESTED_MAIL, OK, START_DATA,
    UNRECOGNIZED,
};
use crate::state::{Hello, HelloKind, State};
use crate::{Address, ConnectResult, Handler, MailResult, RcptResult, Response};
use log::{debug, trace};
use std::net::SocketAddr;
use std::str;

/// Message size advertised in the EHLO response unless configured otherwise
pub const DEFAULT_SIZE_LIMIT: usize = 10_240_000;

/// Longest line accepted from a client, including the `\r\n`
pub const MAX_LINE_LENGTH: usize = 4096;

// Sent after the server name in the greeting
const PRODUCT_ID: &str = "smtpd";

/// The client end of an SMTP connection, as seen by a `Handler`
#[derive(Debug, Clone)]
pub struct Connection {
    remote: SocketAddr,
    hello: Option<Hello>,
}

impl Connection {
    /// Create a connection for a client at the given address
    pub fn new(remote: SocketAddr) -> Self {
        Self {
            remote,
            hello: None,
        }
    }

    /// Address of the client
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// The last HELO or EHLO sent by the client
    pub fn hello(&self) -> Option<&Hello> {
        self.hello.as_ref()
    }
}

#[derive(Clone, Debug)]
/// Builds an smtp `Session`
///
/// # Examples
/// ```
/// # use smtpd::{AcceptAllHandler, SessionBuilder};
/// # use std::net::SocketAddr;
/// # let addr: SocketAddr = "127.0.0.1:49152".parse().unwrap();
/// // Create a session builder that holds the configuration
/// let mut builder = SessionBuilder::new("mx.example.com");
/// builder.size_limit(1024 * 1024);
/// // Then when a client connects
/// let session = builder.build(addr, AcceptAllHandler);
/// ```
pub struct SessionBuilder {
    name: String,
    size_limit: usize,
}

impl SessionBuilder {
    /// Create a builder for sessions announcing the given server name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }

    /// Set the message size advertised with the SIZE extension
    pub fn size_limit(&mut self, size_limit: usize) -> &mut Self {
        self.size_limit = size_limit;
        self
    }

    /// Build a new session to handle a connection from the given address
    pub fn build<H: Handler>(&self, remote: SocketAddr, handler: H) -> Session<H> {
        Session {
            name: self.name.clone(),
            size_limit: self.size_limit,
            handler,
            conn: Connection::new(remote),
            state: State::Idle,
        }
    }
}

/// A single smtp session connected to a single client
pub struct Session<H: Handler> {
    name: String,
    size_limit: usize,
    handler: H,
    conn: Connection,
    state: State,
}

impl<H: Handler> Session<H> {
    /// Get the greeting to send to a newly connected client.
    ///
    /// The `Handler` is asked whether to accept the connection first. A
    /// rejected connection gets an empty response with `Action::Close`.
    pub fn greeting(&mut self) -> Response {
        match self.handler.connect(&self.conn) {
            ConnectResult::Ok => {
                let res = Response::new(220, format!("{} ESMTP {}", self.name, PRODUCT_ID));
                res.log();
                res
            }
            ConnectResult::Reject => {
                debug!("({}) connection rejected", self.conn.remote);
                CONNECTION_REJECTED
            }
        }
    }

    /// Process a line sent by the client.
    ///
    /// The line must include its `\r\n` ending. Returns a response that should
    /// be written back to the client. A line longer than `MAX_LINE_LENGTH`
    /// is refused and the response closes the connection, so callers only
    /// need to read one octet past the limit.
    ///
    /// # Examples
    /// ```
    /// use smtpd::{AcceptAllHandler, Action, SessionBuilder};
    /// # use std::net::SocketAddr;
    /// # let addr: SocketAddr = "127.0.0.1:49152".parse().unwrap();
    /// # let mut session = SessionBuilder::new("name").build(addr, AcceptAllHandler);
    /// let response = session.process(b"MAIL FROM:<ship@sea.com>\r\n");
    ///
    /// // Check the response
    /// assert_eq!(response.is_error, false);
    /// assert_eq!(response.action, Action::Reply);
    ///
    /// // Write the response
    /// let mut msg = Vec::new();
    /// response.write_to(&mut msg).unwrap();
    /// assert_eq!(&msg, b"250 2.1.0 Ok\r\n");
    /// ```
    pub fn process(&mut self, line: &[u8]) -> Response {
        if line.len() > MAX_LINE_LENGTH {
            debug!("({}) line too long", self.conn.remote);
            LINE_TOO_LONG.log();
            return LINE_TOO_LONG;
        }
        trace!("> {}", String::from_utf8_lossy(line).trim_end());
        let response = match str::from_utf8(line) {
            Ok(line) => self.command(CommandLine::new(line)),
            Err(_) => INVALID_UTF8,
        };
        response.log();
        response
    }

    /// The connection as seen by the `Handler`
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// True between an accepted MAIL command and the end of the transaction
    pub fn in_transaction(&self) -> bool {
        self.state.in_transaction()
    }

    /// The handler controlling this session
    pub fn handler(&self) -> &H {
        &self.handler
    }

    fn command(&mut self, line: CommandLine) -> Response {
        if let Err(err) = line.validate() {
            return Response::new(500, err.to_string());
        }
        match line.verb().as_str() {
            "HELO" => self.hello(HelloKind::Helo, line.argument()),
            "EHLO" => self.hello(HelloKind::Ehlo, line.argument()),
            "MAIL" => self.mail(line.argument()),
            "RCPT" => self.rcpt(line.argument()),
            "DATA" => START_DATA,
            "RSET" => {
                self.state = State::Idle;
                OK
            }
            "NOOP" => OK,
            "QUIT" => {
                self.state = State::Idle;
                GOODBYE
            }
            verb => {
                debug!("({}) command not recognized: {:?}", self.conn.remote, verb);
                UNRECOGNIZED
            }
        }
    }

    fn hello(&mut self, kind: HelloKind, host: &str) -> Response {
        debug!("({}) {} {:?}", self.conn.remote, kind.verb(), host);
        self.conn.hello = Some(Hello {
            kind,
            host: host.to_owned(),
        });
        match kind {
            HelloKind::Helo => Response::new(250, self.name.clone()),
            HelloKind::Ehlo => self.ehlo_response(),
        }
    }

    fn ehlo_response(&self) -> Response {
        let extensions = vec![
            "PIPELINING".to_owned(),
            format!("SIZE {}", self.size_limit),
            "ENHANCEDSTATUSCODES".to_owned(),
            "8BITMIME".to_owned(),
            "DSN".to_owned(),
        ];
        Response::multiline(250, self.name.clone(), extensions)
    }

    fn mail(&mut self, arg: &str) -> Response {
        let from = match reverse_path(arg) {
            Some(path) => Address::new(path),
            None => return BAD_SENDER,
        };
        if self.state.in_transaction() {
            return NESTED_MAIL;
        }
        if from.is_null() {
            debug!("({}) mail from null sender", self.conn.remote);
        } else {
            debug!("({}) mail from: {:?}", self.conn.remote, from.email());
        }
        match self.handler.mail(&self.conn, from) {
            MailResult::Ok(envelope) => {
                self.state = State::Mail(envelope);
                ADDRESS_OK
            }
            MailResult::Rejected(reason) => {
                debug!("({}) sender rejected: {}", self.conn.remote, reason);
                Response::new(550, format!("5.7.1 {}", one_line(&reason)))
            }
            MailResult::NotConfigured => {
                debug!("({}) no mail handler, rejecting MAIL FROM", self.conn.remote);
                MAIL_NOT_CONFIGURED
            }
        }
    }

    fn rcpt(&mut self, arg: &str) -> Response {
        let envelope = match &mut self.state {
            State::Mail(envelope) => envelope,
            State::Idle => return NEED_MAIL,
        };
        let to = match forward_path(arg) {
            Some(path) => Address::new(path),
            None => return BAD_RECIPIENT,
        };
        debug!("({}) rcpt to: {:?}", self.conn.remote, to.email());
        match envelope.add_recipient(to) {
            RcptResult::Ok => ADDRESS_OK,
            RcptResult::Rejected(reason) => {
                debug!("({}) recipient rejected: {}", self.conn.remote, reason);
                Response::new(550, one_line(&reason))
            }
        }
    }
}

//----- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AcceptAllHandler, Action, Envelope};
    use matches::assert_matches;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct EmptyHandler {}
    impl Handler for EmptyHandler {}

    // Records every accepted recipient in a list shared with the test
    #[derive(Default)]
    struct RecordingHandler {
        mails: usize,
        recipients: Rc<RefCell<Vec<String>>>,
    }

    struct RecordingEnvelope {
        recipients: Rc<RefCell<Vec<String>>>,
    }

    impl Envelope for RecordingEnvelope {
        fn add_recipient(&mut self, rcpt: Address) -> RcptResult {
            if rcpt.domain() == "land.com" {
                return RcptResult::Rejected("no fish on land".to_owned());
            }
            self.recipients.borrow_mut().push(rcpt.email().to_owned());
            RcptResult::Ok
        }
    }

    impl Handler for RecordingHandler {
        fn mail(&mut self, _conn: &Connection, _from: Address) -> MailResult {
            self.mails += 1;
            MailResult::Ok(Box::new(RecordingEnvelope {
                recipients: self.recipients.clone(),
            }))
        }
    }

    struct PickyHandler {}
    impl Handler for PickyHandler {
        fn connect(&mut self, conn: &Connection) -> ConnectResult {
            if conn.remote_addr().ip().is_loopback() {
                ConnectResult::Ok
            } else {
                ConnectResult::Reject
            }
        }

        fn mail(&mut self, conn: &Connection, from: Address) -> MailResult {
            match conn.hello() {
                Some(hello) if from.domain() == hello.host => {
                    MailResult::Ok(Box::new(crate::BasicEnvelope::new()))
                }
                _ => MailResult::Rejected("sender does not match\r\nhelo".to_owned()),
            }
        }
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:49152".parse().unwrap()
    }

    fn new_session<H: Handler>(handler: H) -> Session<H> {
        SessionBuilder::new("some.name").build(addr(), handler)
    }

    fn written(res: &Response) -> String {
        let mut buf = Vec::new();
        res.write_to(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn greeting() {
        let mut session = new_session(EmptyHandler {});
        let res = session.greeting();
        assert_eq!(written(&res), "220 some.name ESMTP smtpd\r\n");
        assert_eq!(res.action, Action::Reply);
    }

    #[test]
    fn rejected_connection() {
        let remote: SocketAddr = "192.0.2.1:25000".parse().unwrap();
        let mut session = SessionBuilder::new("some.name").build(remote, PickyHandler {});
        let res = session.greeting();
        assert_eq!(res.action, Action::Close);
        assert_eq!(written(&res), "");
    }

    #[test]
    fn helo_ehlo() {
        let mut session = new_session(EmptyHandler {});
        let res = session.process(b"helo a.domain\r\n");
        assert_eq!(written(&res), "250 some.name\r\n");
        assert_matches!(
            session.connection().hello(),
            Some(Hello { kind: HelloKind::Helo, .. })
        );
        let res = session.process(b"EHLO b.domain\r\n");
        assert_eq!(res.code, 250);
        let hello = session.connection().hello().unwrap();
        assert_eq!(hello.kind, HelloKind::Ehlo);
        assert_eq!(hello.host, "b.domain");
    }

    #[test]
    fn ehlo_extensions() {
        let mut session = new_session(EmptyHandler {});
        let res = session.process(b"EHLO client.example\r\n");
        let text = written(&res);
        let lines: Vec<&str> = text.split_terminator("\r\n").collect();
        assert_eq!(
            lines,
            vec![
                "250-some.name",
                "250-PIPELINING",
                "250-SIZE 10240000",
                "250-ENHANCEDSTATUSCODES",
                "250-8BITMIME",
                "250 DSN",
            ]
        );
    }

    #[test]
    fn ehlo_size_limit() {
        let mut session = SessionBuilder::new("some.name")
            .size_limit(1000)
            .build(addr(), EmptyHandler {});
        let res = session.process(b"EHLO client.example\r\n");
        assert!(res.lines().contains(&"SIZE 1000"));
    }

    #[test]
    fn hello_without_hostname() {
        let mut session = new_session(EmptyHandler {});
        let res = session.process(b"EHLO\r\n");
        assert_eq!(res.code, 250);
        assert_eq!(res.lines().len(), 6);
        let hello = session.connection().hello().unwrap();
        assert_eq!(hello.kind, HelloKind::Ehlo);
        assert_eq!(hello.host, "");
        let res = session.process(b"HELO\r\n");
        assert_eq!(written(&res), "250 some.name\r\n");
    }

    #[test]
    fn mail_from() {
        let mut session = new_session(AcceptAllHandler);
        session.process(b"EHLO a.domain\r\n");
        let res = session.process(b"MAIL FROM:<ship@sea.com>\r\n");
        assert_eq!(written(&res), "250 2.1.0 Ok\r\n");
        assert!(session.in_transaction());
    }

    #[test]
    fn null_sender() {
        let mut session = new_session(AcceptAllHandler);
        let res = session.process(b"MAIL FROM:<>\r\n");
        assert_eq!(res.code, 250);
    }

    #[test]
    fn bad_sender_syntax() {
        let mut session = new_session(AcceptAllHandler);
        let res = session.process(b"MAIL ship@sea.com\r\n");
        assert_eq!(written(&res), "501 5.1.7 Bad sender address syntax\r\n");
        assert!(!session.in_transaction());
    }

    #[test]
    fn mail_not_configured() {
        let mut session = new_session(EmptyHandler {});
        let res = session.process(b"MAIL FROM:<ship@sea.com>\r\n");
        assert_eq!(res.code, 451);
        assert_eq!(res.action, Action::Reply);
        assert!(!session.in_transaction());
    }

    #[test]
    fn mail_rejected() {
        let mut session = new_session(PickyHandler {});
        session.process(b"HELO sea.com\r\n");
        let res = session.process(b"MAIL FROM:<ship@land.com>\r\n");
        assert_eq!(
            written(&res),
            "550 5.7.1 sender does not match  helo\r\n"
        );
        assert!(!session.in_transaction());
        let res = session.process(b"MAIL FROM:<ship@sea.com>\r\n");
        assert_eq!(res.code, 250);
    }

    #[test]
    fn nested_mail() {
        let handler = RecordingHandler::default();
        let recipients = handler.recipients.clone();
        let mut session = new_session(handler);
        assert_eq!(session.process(b"MAIL FROM:<a@b.com>\r\n").code, 250);
        assert_eq!(session.process(b"RCPT TO:<c@d.com>\r\n").code, 250);
        let res = session.process(b"MAIL FROM:<a@b.com>\r\n");
        assert_eq!(written(&res), "503 5.5.1 Error: nested MAIL command\r\n");
        assert_eq!(session.handler().mails, 1);
        // The first envelope is still the active one
        assert_eq!(session.process(b"RCPT TO:<e@f.com>\r\n").code, 250);
        assert_eq!(*recipients.borrow(), vec!["c@d.com", "e@f.com"]);
    }

    #[test]
    fn rcpt_without_mail() {
        let mut session = new_session(RecordingHandler::default());
        let res = session.process(b"RCPT TO:<x@y.com>\r\n");
        assert_eq!(written(&res), "503 5.5.1 Error: need MAIL command\r\n");
        assert!(!session.in_transaction());
        assert_eq!(session.handler().mails, 0);
    }

    #[test]
    fn rcpt_to() {
        let handler = RecordingHandler::default();
        let recipients = handler.recipients.clone();
        let mut session = new_session(handler);
        session.process(b"helo a.domain\r\n");
        session.process(b"mail from:<ship@sea.com>\r\n");
        let res1 = session.process(b"rcpt to:<fish@sea.com>\r\n");
        assert_eq!(written(&res1), "250 2.1.0 Ok\r\n");
        let res2 = session.process(b"RCPT TO:<kraken@sea.com>\r\n");
        assert_eq!(res2.code, 250);
        assert_eq!(*recipients.borrow(), vec!["fish@sea.com", "kraken@sea.com"]);
    }

    #[test]
    fn bad_recipient_syntax() {
        let mut session = new_session(AcceptAllHandler);
        session.process(b"MAIL FROM:<ship@sea.com>\r\n");
        let res = session.process(b"RCPT fish@sea.com\r\n");
        assert_eq!(written(&res), "501 5.1.3 Bad recipient address syntax\r\n");
        assert!(session.in_transaction());
    }

    #[test]
    fn rejected_recipient() {
        let mut session = new_session(RecordingHandler::default());
        session.process(b"MAIL FROM:<ship@sea.com>\r\n");
        let res = session.process(b"RCPT TO:<crab@land.com>\r\n");
        assert_eq!(written(&res), "550 no fish on land\r\n");
        assert_eq!(res.action, Action::Reply);
        assert!(session.in_transaction());
    }

    #[test]
    fn data() {
        let mut session = new_session(AcceptAllHandler);
        session.process(b"MAIL FROM:<ship@sea.com>\r\n");
        let res = session.process(b"DATA\r\n");
        assert_eq!(written(&res), "354 Go ahead\r\n");
        let res = session.process(b"DATA now\r\n");
        assert_eq!(written(&res), "500 unexpected argument\r\n");
    }

    #[test]
    fn rset() {
        let mut session = new_session(AcceptAllHandler);
        session.process(b"helo some.domain\r\n");
        session.process(b"mail from:<ship@sea.com>\r\n");
        let res = session.process(b"rset\r\n");
        assert_eq!(written(&res), "250 2.0.0 OK\r\n");
        assert!(!session.in_transaction());
        assert_eq!(session.process(b"rcpt to:<fish@sea.com>\r\n").code, 503);
        assert_eq!(session.process(b"mail from:<ship@sea.com>\r\n").code, 250);
    }

    #[test]
    fn hello_keeps_transaction() {
        let handler = RecordingHandler::default();
        let recipients = handler.recipients.clone();
        let mut session = new_session(handler);
        session.process(b"mail from:<ship@sea.com>\r\n");
        session.process(b"rcpt to:<fish@sea.com>\r\n");
        assert_eq!(session.process(b"HELO x\r\n").code, 250);
        assert!(session.in_transaction());
        assert_eq!(session.process(b"ehlo other.domain\r\n").code, 250);
        assert!(session.in_transaction());
        assert_eq!(session.process(b"rcpt to:<eel@sea.com>\r\n").code, 250);
        assert_eq!(*recipients.borrow(), vec!["fish@sea.com", "eel@sea.com"]);
        assert_eq!(session.connection().hello().unwrap().host, "other.domain");
    }

    #[test]
    fn noop() {
        let mut session = new_session(AcceptAllHandler);
        session.process(b"mail from:<ship@sea.com>\r\n");
        let res = session.process(b"NOOP\r\n");
        assert_eq!(written(&res), "250 2.0.0 OK\r\n");
        assert!(session.in_transaction());
    }

    #[test]
    fn quit() {
        let mut session = new_session(AcceptAllHandler);
        session.process(b"helo a.domain\r\n");
        session.process(b"mail from:<ship@sea.com>\r\n");
        let res = session.process(b"quit\r\n");
        assert_eq!(written(&res), "221 2.0.0 Bye\r\n");
        assert_eq!(res.action, Action::Close);
        assert!(!session.in_transaction());
    }

    #[test]
    fn quit_with_argument() {
        let mut session = new_session(AcceptAllHandler);
        let res = session.process(b"QUIT now\r\n");
        assert_eq!(res.code, 500);
        assert_eq!(res.action, Action::Reply);
    }

    #[test]
    fn missing_crlf() {
        let mut session = new_session(AcceptAllHandler);
        let res = session.process(b"NOOP\n");
        assert_eq!(written(&res), "500 line doesn't end in \\r\\n\r\n");
        assert_eq!(res.action, Action::Reply);
    }

    #[test]
    fn unrecognized() {
        let mut session = new_session(AcceptAllHandler);
        let res = session.process(b"VRFY kraken\r\n");
        assert_eq!(written(&res), "502 5.5.2 Error: command not recognized\r\n");
    }

    #[test]
    fn domain_badchars() {
        let mut session = new_session(AcceptAllHandler);
        let res = session.process(b"helo world\x40\xff\r\n");
        assert_eq!(written(&res), "500 line is not valid UTF-8\r\n");
        assert_eq!(res.action, Action::Reply);
        assert!(session.connection().hello().is_none());
        let res = session.process(b"helo world\r\n");
        assert_eq!(written(&res), "250 some.name\r\n");
        assert_eq!(session.connection().hello().unwrap().host, "world");
    }

    #[test]
    fn empty_recipient() {
        let mut session = new_session(RecordingHandler::default());
        session.process(b"MAIL FROM:<>\r\n");
        let res = session.process(b"RCPT TO:<>\r\n");
        assert_eq!(written(&res), "501 5.1.3 Bad recipient address syntax\r\n");
        assert!(session.in_transaction());
    }

    #[test]
    fn rcpt_trailing_blanks() {
        let handler = RecordingHandler::default();
        let recipients = handler.recipients.clone();
        let mut session = new_session(handler);
        session.process(b"MAIL FROM:<ship@sea.com>\r\n");
        let res = session.process(b"RCPT TO:<fish@sea.com>  \t \r\n");
        assert_eq!(written(&res), "250 2.1.0 Ok\r\n");
        assert_eq!(*recipients.borrow(), vec!["fish@sea.com"]);
    }

    #[test]
    fn line_length_limit() {
        let mut session = new_session(AcceptAllHandler);
        let mut line = b"NOOP".to_vec();
        line.resize(MAX_LINE_LENGTH - 2, b' ');
        line.extend_from_slice(b"\r\n");
        assert_eq!(written(&session.process(&line)), "250 2.0.0 OK\r\n");
        let long = vec![b'A'; MAX_LINE_LENGTH + 1];
        let res = session.process(&long);
        assert_eq!(written(&res), "500 5.5.6 Error: line too long\r\n");
        assert_eq!(res.action, Action::Close);
    }
}
