//! # Errors
//!
//! Every layer has its own error enum ([`TransportError`], [`FramingError`],
//! [`DecodeError`], [`EncodeError`], [`ProtocolError`]). The client stub folds them into
//! [`RpcError`] and wraps that in a [`CallError`] naming the method that failed.
//!
//! Callers that only care about the category of a failure use [`ErrorKind`].
use crate::protocol::{DecodeError, EncodeError, MessageType, ProtocolError};
use crate::transport::{FramingError, TransportError};
use std::fmt;

/// Flat classification of every failure the client can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The transport could not be opened.
    Connection,
    /// Reading or writing an open transport failed, including timeouts.
    Io,
    /// The HTTP envelope around a message was malformed.
    ProtocolFraming,
    /// The reply could not be decoded, or did not match the expected shape.
    Decode,
    /// An outgoing value could not be encoded.
    Encode,
    /// The reply does not belong to the call that was sent.
    ProtocolSequence,
    /// The server reported an error.
    RemoteApplication,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connection => "connection error",
            ErrorKind::Io => "I/O error",
            ErrorKind::ProtocolFraming => "protocol framing error",
            ErrorKind::Decode => "decode error",
            ErrorKind::Encode => "encode error",
            ErrorKind::ProtocolSequence => "protocol sequence error",
            ErrorKind::RemoteApplication => "remote application error",
        };
        f.write_str(name)
    }
}

/// Type codes of a Thrift application exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationExceptionKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    MissingResult,
    InternalError,
    ProtocolError,
    InvalidTransform,
    InvalidProtocol,
    UnsupportedClientType,
    Other(i32),
}

impl From<i32> for ApplicationExceptionKind {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::UnknownMethod,
            2 => Self::InvalidMessageType,
            3 => Self::WrongMethodName,
            4 => Self::BadSequenceId,
            5 => Self::MissingResult,
            6 => Self::InternalError,
            7 => Self::ProtocolError,
            8 => Self::InvalidTransform,
            9 => Self::InvalidProtocol,
            10 => Self::UnsupportedClientType,
            other => Self::Other(other),
        }
    }
}

/// Where a [`RemoteError`] comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// A generic failure raised by the server runtime (unknown method, internal error...).
    Application(ApplicationExceptionKind),
    /// One of the exceptions declared by the called method.
    Declared(&'static str),
}

/// An error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn application(kind: ApplicationExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Application(kind),
            message: message.into(),
        }
    }

    pub fn declared(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Declared(name),
            message: message.into(),
        }
    }
}

/// Any failure of a single remote call.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Transport(TransportError),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("Reply carries sequence id {received}, expected {expected}")]
    SequenceMismatch { expected: i32, received: i32 },
    #[error("Reply is for method '{received}', expected '{expected}'")]
    MethodMismatch { expected: String, received: String },
    #[error("Unexpected {0:?} message in reply")]
    UnexpectedMessageType(MessageType),
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl RpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Transport(err) => transport_kind(err),
            RpcError::Decode(_) => ErrorKind::Decode,
            RpcError::Encode(_) => ErrorKind::Encode,
            RpcError::SequenceMismatch { .. }
            | RpcError::MethodMismatch { .. }
            | RpcError::UnexpectedMessageType(_) => ErrorKind::ProtocolSequence,
            RpcError::Remote(_) => ErrorKind::RemoteApplication,
        }
    }
}

fn transport_kind(err: &TransportError) -> ErrorKind {
    match err {
        TransportError::Connection { .. } => ErrorKind::Connection,
        TransportError::Framing(FramingError::InvalidRequest(_)) => ErrorKind::Encode,
        TransportError::Framing(_) => ErrorKind::ProtocolFraming,
        TransportError::EndOfStream { .. } => ErrorKind::Decode,
        TransportError::AlreadyOpen | TransportError::NotOpen | TransportError::Io(_) => {
            ErrorKind::Io
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        ProtocolError::from(err).into()
    }
}

impl From<ProtocolError> for RpcError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Transport(err) => RpcError::Transport(err),
            ProtocolError::Decode(err) => RpcError::Decode(err),
            ProtocolError::Encode(err) => RpcError::Encode(err),
        }
    }
}

/// A failed call to `method`.
#[derive(Debug, thiserror::Error)]
#[error("Call to '{method}' failed: {source}")]
pub struct CallError {
    pub method: &'static str,
    #[source]
    pub source: RpcError,
}

impl CallError {
    pub fn new(method: &'static str, source: impl Into<RpcError>) -> Self {
        Self {
            method,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
