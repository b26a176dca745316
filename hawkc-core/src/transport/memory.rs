//! An in-memory transport: reads come from a fixed input buffer and flushed writes are
//! captured for inspection.
use super::{Transport, TransportError};
use bytes::{Buf, Bytes, BytesMut};

#[derive(Debug, Default)]
pub struct MemoryTransport {
    input: Bytes,
    pending: BytesMut,
    written: BytesMut,
    open: bool,
}

impl MemoryTransport {
    /// Creates a transport with nothing to read.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose reads are served from `input`.
    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: Bytes::copy_from_slice(input.as_ref()),
            ..Self::default()
        }
    }

    /// Bytes that have been flushed so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Takes the flushed bytes, leaving the capture buffer empty.
    pub fn take_written(&mut self) -> Bytes {
        self.written.split().freeze()
    }

    /// Number of bytes still available to read.
    pub fn remaining(&self) -> usize {
        self.input.remaining()
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.open {
            return Err(TransportError::AlreadyOpen);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if self.input.remaining() < buf.len() {
            return Err(TransportError::EndOfStream {
                wanted: buf.len(),
                available: self.input.remaining(),
            });
        }
        self.input.copy_to_slice(buf);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.pending.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let pending = self.pending.split();
        self.written.unsplit(pending);
        Ok(())
    }
}
