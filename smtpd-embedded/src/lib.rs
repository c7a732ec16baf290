//! A SMTP server that can be embedded into another program
//!
//! This library provides a simple embeddable SMTP server. The
//! server uses blocking IO and a threadpool, each client connection is
//! handled by one thread of the pool.
//!
//! # Examples
//! ```no_run
//! use smtpd_embedded::{AcceptAllHandler, Server};
//!
//! let addr = "127.0.0.1:25";
//! let domain = "example.com".to_owned();
//! let mut server = Server::new(AcceptAllHandler);
//!
//! server.with_name(domain)
//!    .with_addr(addr)
//!    .unwrap();
//! server.serve_forever().unwrap();
//! ```

#![forbid(unsafe_code)]
#![forbid(missing_docs)]

mod err;
mod running;
mod session;
mod utils;

pub use crate::err::Error;
pub use crate::running::RunningServer;
pub use smtpd::{
    AcceptAllHandler, Address, BasicEnvelope, ConnectResult, Connection, Envelope, Handler,
    Hello, HelloKind, MailResult, RcptResult, DEFAULT_SIZE_LIMIT,
};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::time::Duration;

const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);

/// `Server` is used to configure and start the SMTP server
pub struct Server<H>
where
    H: Handler + Clone + Send + 'static,
{
    handler: H,
    name: Option<String>,
    num_threads: u32,
    size_limit: usize,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    tcp_listener: Option<TcpListener>,
    socket_address: Vec<SocketAddr>,
}

impl<H> Server<H>
where
    H: Handler + Clone + Send + 'static,
{
    /// Create a new server with the given Handler.
    ///
    /// The handler is cloned for every client connection.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            name: None,
            num_threads: 4,
            size_limit: DEFAULT_SIZE_LIMIT,
            read_timeout: Some(FIVE_MINUTES),
            write_timeout: Some(FIVE_MINUTES),
            tcp_listener: None,
            socket_address: Vec::with_capacity(4),
        }
    }

    /// Give the server a name, announced in the greeting and EHLO response.
    ///
    /// Without a name the hostname of the machine is used.
    pub fn with_name<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Set the size of the threadpool which is equal to the maximum number of
    /// concurrent SMTP sessions.
    pub fn with_num_threads(&mut self, num_threads: u32) -> &mut Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the message size advertised in the EHLO response
    pub fn with_size_limit(&mut self, size_limit: usize) -> &mut Self {
        self.size_limit = size_limit;
        self
    }

    /// Set the read timeout of client connections, `None` waits forever
    pub fn with_read_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout of client connections, `None` waits forever
    pub fn with_write_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.write_timeout = timeout;
        self
    }

    /// Set a tcp listener from an already open socket
    pub fn with_tcp_listener(&mut self, listener: TcpListener) -> &mut Self {
        self.tcp_listener = Some(listener);
        self
    }

    /// Add ip addresses and ports to listen on.
    /// Returns an error if the given socket addresses are not valid.
    ///
    /// Without an address or listener the server listens on port 25 of all
    /// interfaces.
    /// ```
    /// # use smtpd_embedded::{AcceptAllHandler, Server};
    /// # let mut server = Server::new(AcceptAllHandler);
    /// server.with_addr("127.0.0.1:25").unwrap();
    /// ```
    pub fn with_addr<A: ToSocketAddrs>(&mut self, addr: A) -> Result<&mut Self, Error> {
        let addrs = addr
            .to_socket_addrs()
            .map_err(|e| Error::with_source("Invalid listen address", e))?;
        self.socket_address.extend(addrs);
        Ok(self)
    }

    /// Start the SMTP server in a background thread
    pub fn serve(self) -> Result<RunningServer, Error> {
        RunningServer::serve(self)
    }

    /// Start the SMTP server and run forever
    pub fn serve_forever(self) -> Result<(), Error> {
        let running = RunningServer::serve(self)?;
        running.join()
    }
}
