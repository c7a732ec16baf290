use crate::Error;
use log::debug;
use smtpd::{Action, Handler, Response, MAX_LINE_LENGTH};
use std::io::{BufRead, Read, Write};

// Reading one octet past the limit is enough for smtpd to refuse the line
const READ_LIMIT: u64 = MAX_LINE_LENGTH as u64 + 1;

// Drives an smtpd::Session over a buffered stream
pub(crate) struct Session<H, S>
where
    H: Handler,
    S: BufRead + Write,
{
    inner: smtpd::Session<H>,
    stream: S,
    line: Vec<u8>,
}

impl<H, S> Session<H, S>
where
    H: Handler,
    S: BufRead + Write,
{
    pub(crate) fn new(inner: smtpd::Session<H>, stream: S) -> Self {
        let line = Vec::with_capacity(100);
        Self {
            inner,
            stream,
            line,
        }
    }

    // Run the session until the client quits or the connection fails
    pub(crate) fn run(&mut self) -> Result<(), Error> {
        let greeting = self.inner.greeting();
        if !self.respond(&greeting)? {
            return Ok(());
        }
        let remote = self.inner.connection().remote_addr();
        loop {
            self.line.clear();
            let num_bytes = (&mut self.stream)
                .take(READ_LIMIT)
                .read_until(b'\n', &mut self.line)
                .map_err(|e| Error::with_source("Cannot read command", e))?;
            if num_bytes == 0 {
                debug!("({}) Connection closed by client", remote);
                return Ok(());
            }
            if num_bytes <= MAX_LINE_LENGTH && !self.line.ends_with(b"\n") {
                // End of stream in the middle of a line
                debug!("({}) Connection closed mid-line", remote);
                return Ok(());
            }
            let res = self.inner.process(&self.line);
            if !self.respond(&res)? {
                return Ok(());
            }
        }
    }

    // Send a response, returns false if the connection should be closed
    fn respond(&mut self, res: &Response) -> Result<bool, Error> {
        match res.action {
            Action::Reply => {
                write_response(&mut self.stream, res)?;
                Ok(true)
            }
            Action::Close => {
                write_response(&mut self.stream, res)?;
                Ok(false)
            }
        }
    }
}

fn write_response(writer: &mut dyn Write, res: &Response) -> Result<(), Error> {
    res.write_to(writer)
        .and_then(|_| writer.flush())
        .map_err(|e| Error::with_source("Cannot write response", e))
}
