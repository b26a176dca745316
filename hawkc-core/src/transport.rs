//! # Transports
//!
//! A [`Transport`] is a blocking byte stream with an explicit lifecycle. Everything above
//! it (the [`crate::protocol`] codec and the [`crate::client`] stubs) only ever sees this
//! trait, so transports can be stacked: [`HttpTransport`] wraps any other transport and
//! tunnels the bytes written to it through HTTP `POST` requests.
//!
//! ## Read semantics
//!
//! [`Transport::read`] always fills the whole buffer or fails. Short reads from the
//! underlying stream are buffered internally and never surfaced to callers.
//!
//! * A socket closing in the middle of a read is an [`TransportError::Io`].
//! * A *bounded* source running dry (an in-memory buffer, the body of an HTTP response)
//!   is a [`TransportError::EndOfStream`]. The protocol layer reports it as a truncated
//!   message.
//!
//! ## Lifecycle
//!
//! Use [`Transport::open_scoped`] to get a guard that closes the transport on every
//! exit path, including early returns and panics:
//!
//! ```rust,no_run
//! use hawkc_core::transport::{Endpoint, TcpTransport, Transport};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut transport = TcpTransport::new(Endpoint::new("localhost", 8080));
//! let mut session = transport.open_scoped()?;
//! session.write(b"ping")?;
//! session.flush()?;
//! # Ok(())
//! # }
//! ```
pub mod http;
pub mod memory;
pub mod tcp;

pub use http::{FramingError, HttpTransport};
pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Where a base transport connects to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Errors raised by any [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to '{endpoint}': {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Transport is already open")]
    AlreadyOpen,
    #[error("Transport is not open")]
    NotOpen,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("End of stream: wanted {wanted} bytes, {available} available")]
    EndOfStream { wanted: usize, available: usize },
    #[error("HTTP framing error: {0}")]
    Framing(#[from] FramingError),
}

/// A blocking, buffered byte stream.
pub trait Transport {
    /// Establishes the underlying connection.
    ///
    /// Fails with [`TransportError::AlreadyOpen`] when called on an open transport.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Releases the connection. Calling it on a closed transport does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Fills `buf` completely, blocking until enough bytes arrive.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Appends `buf` to the outbound buffer. Nothing is sent until [`Transport::flush`].
    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Delivers every buffered byte.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Opens the transport and returns a guard that closes it when dropped.
    fn open_scoped(&mut self) -> Result<OpenTransport<'_, Self>, TransportError>
    where
        Self: Sized,
    {
        self.open()?;
        Ok(OpenTransport { inner: self })
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<(), TransportError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush()
    }
}

/// An open transport that is closed when this guard goes out of scope.
///
/// Dereferences to the wrapped transport, so it can be handed to a protocol or a client
/// stub with `&mut *guard`.
#[derive(Debug)]
pub struct OpenTransport<'a, T: Transport> {
    inner: &'a mut T,
}

impl<T: Transport> Deref for OpenTransport<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.inner
    }
}

impl<T: Transport> DerefMut for OpenTransport<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.inner
    }
}

impl<T: Transport> Drop for OpenTransport<'_, T> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_displays_as_host_and_port() {
        let endpoint = Endpoint::new("hawk.example.org", 8080);
        assert_eq!(endpoint.to_string(), "hawk.example.org:8080");
        assert_eq!(endpoint.host(), "hawk.example.org");
        assert_eq!(endpoint.port(), 8080);
    }

    #[test]
    fn scoped_guard_closes_on_error_path() {
        let mut transport = MemoryTransport::new();

        let result: Result<(), TransportError> = (|| {
            let mut session = transport.open_scoped()?;
            assert!(session.is_open());
            let mut buf = [0u8; 4];
            session.read(&mut buf)?;
            Ok(())
        })();

        assert!(matches!(
            result,
            Err(TransportError::EndOfStream {
                wanted: 4,
                available: 0
            })
        ));
        assert!(!transport.is_open());
    }

    #[test]
    fn boxed_transport_delegates() {
        let mut transport: Box<dyn Transport> = Box::new(MemoryTransport::with_input(b"abc"));
        transport.open().unwrap();

        let mut buf = [0u8; 3];
        transport.read(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        transport.close();
        transport.close();
        assert!(!transport.is_open());
    }
}
