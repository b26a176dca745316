//! # Socket Transport
//!
//! The base transport: a plain TCP stream with a buffered reader and an outbound
//! buffer that is written out in one go on [`Transport::flush`].
//!
//! Timeouts are applied at the socket level. When one fires, the blocked read or write
//! fails with an [`std::io::ErrorKind::WouldBlock`] or [`std::io::ErrorKind::TimedOut`]
//! error, surfaced as [`TransportError::Io`].
use super::{Endpoint, Transport, TransportError};
use bytes::BytesMut;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

const READ_BUFFER_SIZE: usize = 8 * 1024;

#[derive(Debug)]
pub struct TcpTransport {
    endpoint: Endpoint,
    timeout: Option<Duration>,
    stream: Option<BufReader<TcpStream>>,
    write_buf: BytesMut,
}

impl TcpTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: None,
            stream: None,
            write_buf: BytesMut::new(),
        }
    }

    /// Applies `timeout` to connecting, reading and writing.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn connect(&self) -> Result<TcpStream, TransportError> {
        let connection_error = |source| TransportError::Connection {
            endpoint: self.endpoint.to_string(),
            source,
        };

        let addrs = (self.endpoint.host(), self.endpoint.port())
            .to_socket_addrs()
            .map_err(connection_error)?;

        let mut last_error = None;

        for addr in addrs {
            let attempt = match self.timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };

            match attempt {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    tracing::trace!(%addr, error = %err, "connect attempt failed");
                    last_error = Some(err);
                }
            }
        }

        Err(connection_error(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        })))
    }
}

impl Transport for TcpTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        let stream = self.connect()?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        stream.set_nodelay(true)?;

        tracing::debug!(endpoint = %self.endpoint, "socket transport opened");

        self.stream = Some(BufReader::with_capacity(READ_BUFFER_SIZE, stream));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; there is nothing useful to do with the error.
            let _ = stream.get_ref().shutdown(Shutdown::Both);
            tracing::debug!(endpoint = %self.endpoint, "socket transport closed");
        }
        self.write_buf.clear();
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if self.stream.is_none() {
            return Err(TransportError::NotOpen);
        }
        self.write_buf.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let pending = self.write_buf.split();

        tracing::trace!(bytes = pending.len(), "flushing socket transport");

        let socket = stream.get_mut();
        socket.write_all(&pending)?;
        socket.flush()?;
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
