use crate::session::Session;
use crate::utils::system_hostname;
use crate::{Error, Server};
use bufstream::BufStream;
use log::{debug, error, info, warn};
use scoped_threadpool::Pool;
use smtpd::{Handler, SessionBuilder};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "0.0.0.0:25";

struct ServerState<H> {
    listener: TcpListener,
    session_builder: SessionBuilder,
    handler: H,
    num_threads: u32,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

/// A server that is accepting connections in a background thread
pub struct RunningServer {
    stop: Arc<AtomicBool>,
    local_addr: SocketAddr,
    join: JoinHandle<Result<(), Error>>,
}

impl RunningServer {
    pub(crate) fn serve<H>(config: Server<H>) -> Result<Self, Error>
    where
        H: Handler + Clone + Send + 'static,
    {
        if config.num_threads == 0 {
            return Error::bail("The server needs at least one thread");
        }
        let listener = match config.tcp_listener {
            Some(listener) => listener,
            None if config.socket_address.is_empty() => TcpListener::bind(DEFAULT_ADDRESS)
                .map_err(|err| Error::with_source("Cannot open listen address", err))?,
            None => TcpListener::bind(&config.socket_address[..])
                .map_err(|err| Error::with_source("Cannot open listen address", err))?,
        };
        let local_addr = listener.local_addr()?;
        let name = config.name.unwrap_or_else(system_hostname);
        let mut session_builder = SessionBuilder::new(name.clone());
        session_builder.size_limit(config.size_limit);
        let state = ServerState {
            listener,
            session_builder,
            handler: config.handler,
            num_threads: config.num_threads,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        };
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let join = thread::Builder::new()
            .name("smtpd-accept".to_owned())
            .spawn(move || run(&name, state, &stop_flag))?;
        Ok(Self {
            stop,
            local_addr,
            join,
        })
    }

    /// The address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections.
    ///
    /// Returns once sessions that are already running have finished.
    pub fn stop(self) -> Result<(), Error> {
        self.stop.store(true, Ordering::SeqCst);
        // Wake up the listener so that it sees the stop flag
        if let Err(e) = TcpStream::connect(wake_addr(self.local_addr)) {
            warn!("Cannot wake listener on {}: {}", self.local_addr, e);
        }
        self.join()
    }

    /// Wait for the server thread to finish
    pub fn join(self) -> Result<(), Error> {
        self.join
            .join()
            .map_err(|_| Error::new("Error joining server"))?
    }
}

fn run<H>(name: &str, state: ServerState<H>, stop: &AtomicBool) -> Result<(), Error>
where
    H: Handler + Clone + Send,
{
    let mut pool = Pool::new(state.num_threads);
    info!("{} SMTP started on {}", name, state.listener.local_addr()?);
    pool.scoped(|scope| {
        for conn in state.listener.incoming() {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let stream = match conn {
                Ok(stream) => stream,
                Err(err) if is_transient(&err) => {
                    warn!("Accept error: {}", err);
                    continue;
                }
                Err(err) => return Err(Error::with_source("Cannot accept connection", err)),
            };
            let builder = &state.session_builder;
            let handler = state.handler.clone();
            let timeouts = (state.read_timeout, state.write_timeout);
            scope.execute(move || handle_connection(stream, builder, handler, timeouts));
        }
        Ok(())
    })?;
    info!("{} SMTP stopped", name);
    Ok(())
}

fn handle_connection<H: Handler>(
    stream: TcpStream,
    session_builder: &SessionBuilder,
    handler: H,
    (read_timeout, write_timeout): (Option<Duration>, Option<Duration>),
) {
    let remote = match stream.peer_addr() {
        Ok(remote) => remote,
        Err(err) => {
            error!("Cannot get address of client: {}", err);
            return;
        }
    };
    debug!("New connection from {}", remote);
    if let Err(err) = stream
        .set_read_timeout(read_timeout)
        .and_then(|_| stream.set_write_timeout(write_timeout))
    {
        warn!("({}) Cannot set timeouts: {}", remote, err);
    }
    let inner = session_builder.build(remote, handler);
    let mut session = Session::new(inner, BufStream::new(stream));
    if let Err(err) = session.run() {
        error!("({}) {}", remote, err);
    }
}

// Accept errors that only affect the connection being accepted
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

// A listener bound to the unspecified address is reached through loopback
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
