//! # Compact Protocol
//!
//! This module turns [`Value`] trees into bytes on a [`crate::transport::Transport`]
//! and back, using the Thrift compact encoding.
//!
//! Decoding happens in two steps:
//!
//! 1. **Schema-less decode**: [`CompactProtocol::read_message`] reads a whole message into
//!    a generic [`Struct`] of tagged [`Value`]s. The wire format carries enough type
//!    information to do this without knowing the remote schema.
//! 2. **Projection**: typed code maps the tree onto concrete Rust types through
//!    [`FromValue`], which is where a field id/type mismatch is rejected.
//!
//! Decoding is all-or-nothing: a value is only handed back once it has been read
//! completely, so a failure never leaves a half-built tree behind.
pub mod compact;
pub mod value;
pub mod varint;

pub use compact::{CompactProtocol, decode_value, encode_value};
pub use value::{FromValue, IntoValue, List, Map, Struct, TType, Value, ValueType};

use crate::transport::TransportError;

/// Direction of a [`MessageHeader`], as carried in the top bits of the version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }
}

/// Envelope of a single RPC message. The payload travels next to it as a [`Struct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub kind: MessageType,
    pub seq_id: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, kind: MessageType, seq_id: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            seq_id,
        }
    }
}

/// Bounds applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Longest string or binary value, in bytes.
    pub max_string_len: usize,
    /// Largest number of elements in a list, set or map.
    pub max_container_len: usize,
    /// Deepest nesting of structs and collections.
    pub max_depth: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_string_len: 16 * 1024 * 1024,
            max_container_len: 1024 * 1024,
            max_depth: 64,
        }
    }
}

/// The bytes read could not be turned into a value, or the value does not have the
/// shape the caller expected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Input ended before the value was complete")]
    Truncated,
    #[error("Unknown type tag {0:#04x}")]
    UnknownType(u8),
    #[error("Field id {0} appears more than once in a struct")]
    DuplicateFieldId(i16),
    #[error("Bad protocol id {0:#04x}")]
    BadProtocolId(u8),
    #[error("Unsupported protocol version {0}")]
    BadVersion(u8),
    #[error("Unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("Negative size {0}")]
    NegativeSize(i64),
    #[error("Size {size} exceeds the limit of {limit}")]
    SizeLimit { size: usize, limit: usize },
    #[error("Nesting deeper than {0} levels")]
    DepthLimit(usize),
    #[error("Invalid boolean byte {0:#04x}")]
    InvalidBool(u8),
    #[error("Varint is too long or overflows its target type")]
    VarintOverflow,
    #[error("String is not valid UTF-8")]
    InvalidUtf8,
    #[error("Expected a value of type {expected}, found {found}")]
    TypeMismatch { expected: TType, found: TType },
    #[error("Field {field} should be of type {expected}, found {found}")]
    FieldTypeMismatch {
        field: i16,
        expected: TType,
        found: TType,
    },
    #[error("Required field {0} is missing")]
    MissingField(i16),
    #[error("Unknown value {value} for enum {name}")]
    UnknownEnumValue { name: &'static str, value: i32 },
}

/// A value cannot be put on the wire as it is.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("Collection declared as {expected} holds a value of type {found}")]
    ElementTypeMismatch { expected: TType, found: TType },
    #[error("Length {0} does not fit in a 32-bit size")]
    TooLong(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Transport(TransportError),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            // Bounded sources only run dry when the message itself is cut short.
            TransportError::EndOfStream { .. } => ProtocolError::Decode(DecodeError::Truncated),
            other => ProtocolError::Transport(other),
        }
    }
}
