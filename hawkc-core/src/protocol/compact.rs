//! # Compact Encoding
//!
//! Wire layout, per value type:
//!
//! | value          | encoding                                                       |
//! |----------------|----------------------------------------------------------------|
//! | bool (field)   | carried in the field header type nibble (`1` true, `2` false)  |
//! | bool (element) | one byte, `1` true, `2` false                                  |
//! | byte           | one raw byte                                                   |
//! | i16, i32, i64  | zig-zag varint                                                 |
//! | double         | 8 bytes, little-endian                                         |
//! | binary         | varint length, raw bytes                                       |
//! | list, set      | `size << 4 \| elem` if `size < 15`, else `0xF0 \| elem`, varint size |
//! | map            | `0x00` if empty, else varint size then `key << 4 \| value`     |
//! | struct         | field headers and values, terminated by a `0x00` stop byte     |
//!
//! A field header is `delta << 4 | type` when the id is 1..=15 above the previous one,
//! otherwise the type byte followed by the zig-zag `i16` id.
//!
//! Messages start with the protocol id `0x82`, then `version | type << 5`, the sequence
//! id as a plain varint and the method name.
//!
//! Outgoing values are encoded into a local buffer and only handed to the transport once
//! they are complete, so an invalid value never leaves half of itself in the transport's
//! write buffer.
use super::{
    DecodeError, DecodeLimits, EncodeError, MessageHeader, MessageType, ProtocolError,
    value::{List, Map, Struct, TType, Value},
    varint::{self, MAX_VARINT_LEN, MAX_VARINT32_LEN, VarintDecoder},
};
use crate::transport::{MemoryTransport, Transport};
use bytes::{BufMut, Bytes, BytesMut};

pub const PROTOCOL_ID: u8 = 0x82;
pub const VERSION: u8 = 1;
const VERSION_MASK: u8 = 0x1f;
const TYPE_SHIFT: u8 = 5;
const TYPE_BITS: u8 = 0x07;

const STOP: u8 = 0x00;
const BOOLEAN_TRUE: u8 = 0x01;
const BOOLEAN_FALSE: u8 = 0x02;
const BYTE: u8 = 0x03;
const I16: u8 = 0x04;
const I32: u8 = 0x05;
const I64: u8 = 0x06;
const DOUBLE: u8 = 0x07;
const BINARY: u8 = 0x08;
const LIST: u8 = 0x09;
const SET: u8 = 0x0a;
const MAP: u8 = 0x0b;
const STRUCT: u8 = 0x0c;

/// Short collection headers hold sizes up to this value (exclusive).
const SHORT_SIZE_LIMIT: usize = 15;

/// Upper bound on speculative allocation for a declared collection size.
const PREALLOC_LIMIT: usize = 1024;

fn compact_type(ttype: TType) -> u8 {
    match ttype {
        TType::Bool => BOOLEAN_TRUE,
        TType::Byte => BYTE,
        TType::I16 => I16,
        TType::I32 => I32,
        TType::I64 => I64,
        TType::Double => DOUBLE,
        TType::Binary => BINARY,
        TType::List => LIST,
        TType::Set => SET,
        TType::Map => MAP,
        TType::Struct => STRUCT,
    }
}

fn ttype_of(nibble: u8) -> Result<TType, DecodeError> {
    match nibble {
        BOOLEAN_TRUE | BOOLEAN_FALSE => Ok(TType::Bool),
        BYTE => Ok(TType::Byte),
        I16 => Ok(TType::I16),
        I32 => Ok(TType::I32),
        I64 => Ok(TType::I64),
        DOUBLE => Ok(TType::Double),
        BINARY => Ok(TType::Binary),
        LIST => Ok(TType::List),
        SET => Ok(TType::Set),
        MAP => Ok(TType::Map),
        STRUCT => Ok(TType::Struct),
        other => Err(DecodeError::UnknownType(other)),
    }
}

/// Reads and writes compact-encoded values on a borrowed transport.
///
/// The protocol never owns the transport: it cannot outlive it, and the caller stays in
/// charge of opening and closing it.
#[derive(Debug)]
pub struct CompactProtocol<'t, T: Transport> {
    transport: &'t mut T,
    limits: DecodeLimits,
}

impl<'t, T: Transport> CompactProtocol<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        Self {
            transport,
            limits: DecodeLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn transport(&mut self) -> &mut T {
        &mut *self.transport
    }

    /// Writes a message header followed by its body. Call [`CompactProtocol::flush`] to
    /// send it.
    pub fn write_message(
        &mut self,
        header: &MessageHeader,
        body: &Struct,
    ) -> Result<(), ProtocolError> {
        let mut buf = BytesMut::new();
        encode_message_header(&mut buf, header)?;
        encode_struct(&mut buf, body)?;
        self.transport.write(&buf)?;
        Ok(())
    }

    /// Writes the body of `value`. Its type is not written and must be known to the reader.
    pub fn write_value(&mut self, value: &Value) -> Result<(), ProtocolError> {
        let buf = encode_value(value)?;
        self.transport.write(&buf)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ProtocolError> {
        self.transport.flush()?;
        Ok(())
    }

    pub fn read_message(&mut self) -> Result<(MessageHeader, Struct), ProtocolError> {
        let header = self.read_message_header()?;
        let body = self.read_struct(0)?;
        Ok((header, body))
    }

    /// Reads the body of a value of type `ttype`.
    pub fn read_value(&mut self, ttype: TType) -> Result<Value, ProtocolError> {
        self.read_typed(ttype, 0)
    }

    fn read_message_header(&mut self) -> Result<MessageHeader, ProtocolError> {
        let protocol_id = self.read_byte()?;
        if protocol_id != PROTOCOL_ID {
            return Err(DecodeError::BadProtocolId(protocol_id).into());
        }

        let version_and_type = self.read_byte()?;
        let version = version_and_type & VERSION_MASK;
        if version != VERSION {
            return Err(DecodeError::BadVersion(version).into());
        }
        let kind = MessageType::try_from((version_and_type >> TYPE_SHIFT) & TYPE_BITS)?;

        let seq_id = self.read_varint32()? as i32;
        let name = String::from_utf8(self.read_binary()?.to_vec())
            .map_err(|_| DecodeError::InvalidUtf8)?;

        Ok(MessageHeader { name, kind, seq_id })
    }

    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        let mut byte = [0u8; 1];
        self.transport.read(&mut byte)?;
        Ok(byte[0])
    }

    fn read_varint(&mut self, max_len: usize) -> Result<u64, ProtocolError> {
        let mut decoder = VarintDecoder::new(max_len);
        loop {
            let byte = self.read_byte()?;
            if let Some(value) = decoder.push(byte)? {
                return Ok(value);
            }
        }
    }

    fn read_varint32(&mut self) -> Result<u32, ProtocolError> {
        let value = self.read_varint(MAX_VARINT32_LEN)?;
        Ok(u32::try_from(value).map_err(|_| DecodeError::VarintOverflow)?)
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        let value = varint::zigzag_decode(self.read_varint(MAX_VARINT32_LEN)?);
        Ok(i16::try_from(value).map_err(|_| DecodeError::VarintOverflow)?)
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let value = varint::zigzag_decode(self.read_varint(MAX_VARINT32_LEN)?);
        Ok(i32::try_from(value).map_err(|_| DecodeError::VarintOverflow)?)
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(varint::zigzag_decode(self.read_varint(MAX_VARINT_LEN)?))
    }

    /// Reads a size that is encoded as a varint carrying an `i32`.
    fn read_size(&mut self, limit: usize) -> Result<usize, ProtocolError> {
        let size = self.read_varint32()? as i32;
        if size < 0 {
            return Err(DecodeError::NegativeSize(i64::from(size)).into());
        }
        check_size(size as usize, limit)
    }

    fn read_binary(&mut self) -> Result<Bytes, ProtocolError> {
        let len = self.read_size(self.limits.max_string_len)?;
        let mut buf = vec![0u8; len];
        self.transport.read(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        let mut buf = [0u8; 8];
        self.transport.read(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    fn read_bool_element(&mut self) -> Result<bool, ProtocolError> {
        match self.read_byte()? {
            BOOLEAN_TRUE => Ok(true),
            // Some writers put a plain zero in collections.
            BOOLEAN_FALSE | 0 => Ok(false),
            other => Err(DecodeError::InvalidBool(other).into()),
        }
    }

    fn enter(&self, depth: usize) -> Result<usize, ProtocolError> {
        let depth = depth + 1;
        if depth > self.limits.max_depth {
            return Err(DecodeError::DepthLimit(self.limits.max_depth).into());
        }
        Ok(depth)
    }

    fn read_typed(&mut self, ttype: TType, depth: usize) -> Result<Value, ProtocolError> {
        let value = match ttype {
            TType::Bool => Value::Bool(self.read_bool_element()?),
            TType::Byte => Value::Byte(self.read_byte()? as i8),
            TType::I16 => Value::I16(self.read_i16()?),
            TType::I32 => Value::I32(self.read_i32()?),
            TType::I64 => Value::I64(self.read_i64()?),
            TType::Double => Value::Double(self.read_double()?),
            TType::Binary => Value::Binary(self.read_binary()?),
            TType::Struct => Value::Struct(self.read_struct(depth)?),
            TType::List => Value::List(self.read_list(depth)?),
            TType::Set => Value::Set(self.read_list(depth)?),
            TType::Map => Value::Map(self.read_map(depth)?),
        };
        Ok(value)
    }

    fn read_struct(&mut self, depth: usize) -> Result<Struct, ProtocolError> {
        let depth = self.enter(depth)?;
        let mut fields = Struct::new();
        let mut last_id: i16 = 0;

        loop {
            let header = self.read_byte()?;
            if header == STOP {
                return Ok(fields);
            }

            let nibble = header & 0x0f;
            let delta = header >> 4;
            let id = if delta == 0 {
                self.read_i16()?
            } else {
                last_id
                    .checked_add(i16::from(delta))
                    .ok_or(DecodeError::VarintOverflow)?
            };
            last_id = id;

            let value = match nibble {
                BOOLEAN_TRUE => Value::Bool(true),
                BOOLEAN_FALSE => Value::Bool(false),
                other => self.read_typed(ttype_of(other)?, depth)?,
            };

            if fields.insert(id, value).is_some() {
                return Err(DecodeError::DuplicateFieldId(id).into());
            }
        }
    }

    fn read_list(&mut self, depth: usize) -> Result<List, ProtocolError> {
        let depth = self.enter(depth)?;
        let header = self.read_byte()?;
        let elem_type = ttype_of(header & 0x0f)?;

        let short_size = usize::from(header >> 4);
        let size = if short_size == 0x0f {
            self.read_size(self.limits.max_container_len)?
        } else {
            check_size(short_size, self.limits.max_container_len)?
        };

        let mut items = Vec::with_capacity(size.min(PREALLOC_LIMIT));
        for _ in 0..size {
            items.push(self.read_typed(elem_type, depth)?);
        }
        Ok(List::with_items(elem_type, items))
    }

    fn read_map(&mut self, depth: usize) -> Result<Map, ProtocolError> {
        let depth = self.enter(depth)?;
        let size = self.read_size(self.limits.max_container_len)?;
        if size == 0 {
            return Ok(Map::new(TType::Binary, TType::Binary));
        }

        let types = self.read_byte()?;
        let key_type = ttype_of(types >> 4)?;
        let value_type = ttype_of(types & 0x0f)?;

        let mut entries = Vec::with_capacity(size.min(PREALLOC_LIMIT));
        for _ in 0..size {
            let key = self.read_typed(key_type, depth)?;
            let value = self.read_typed(value_type, depth)?;
            entries.push((key, value));
        }
        Ok(Map::with_entries(key_type, value_type, entries))
    }
}

fn check_size(size: usize, limit: usize) -> Result<usize, ProtocolError> {
    if size > limit {
        return Err(DecodeError::SizeLimit { size, limit }.into());
    }
    Ok(size)
}

/// Encodes the body of `value` into a standalone buffer.
pub fn encode_value(value: &Value) -> Result<Bytes, EncodeError> {
    let mut buf = BytesMut::new();
    encode_body(&mut buf, value)?;
    Ok(buf.freeze())
}

/// Decodes one value of type `ttype` from the start of `bytes`.
pub fn decode_value(bytes: &[u8], ttype: TType) -> Result<Value, ProtocolError> {
    let mut transport = MemoryTransport::with_input(bytes);
    let mut session = transport.open_scoped()?;
    CompactProtocol::new(&mut *session).read_value(ttype)
}

fn put_varint(buf: &mut BytesMut, value: u64) {
    let mut scratch = [0u8; MAX_VARINT_LEN];
    let len = varint::encode(value, &mut scratch);
    buf.put_slice(&scratch[..len]);
}

fn put_zigzag(buf: &mut BytesMut, value: i64) {
    put_varint(buf, varint::zigzag_encode(value));
}

fn put_size(buf: &mut BytesMut, size: usize) -> Result<(), EncodeError> {
    let size = i32::try_from(size).map_err(|_| EncodeError::TooLong(size))?;
    put_varint(buf, size as u64);
    Ok(())
}

fn encode_message_header(buf: &mut BytesMut, header: &MessageHeader) -> Result<(), EncodeError> {
    buf.put_u8(PROTOCOL_ID);
    buf.put_u8((VERSION & VERSION_MASK) | ((header.kind as u8) << TYPE_SHIFT));
    put_varint(buf, u64::from(header.seq_id as u32));
    encode_binary(buf, header.name.as_bytes())
}

fn encode_binary(buf: &mut BytesMut, bytes: &[u8]) -> Result<(), EncodeError> {
    put_size(buf, bytes.len())?;
    buf.put_slice(bytes);
    Ok(())
}

fn encode_field_header(buf: &mut BytesMut, last_id: i16, id: i16, type_nibble: u8) {
    let delta = i32::from(id) - i32::from(last_id);
    if (1..=15).contains(&delta) {
        buf.put_u8(((delta as u8) << 4) | type_nibble);
    } else {
        buf.put_u8(type_nibble);
        put_zigzag(buf, i64::from(id));
    }
}

fn encode_struct(buf: &mut BytesMut, fields: &Struct) -> Result<(), EncodeError> {
    let mut last_id = 0;

    for (id, value) in fields.iter() {
        match value {
            Value::Bool(b) => {
                let nibble = if *b { BOOLEAN_TRUE } else { BOOLEAN_FALSE };
                encode_field_header(buf, last_id, id, nibble);
            }
            other => {
                encode_field_header(buf, last_id, id, compact_type(other.ttype()));
                encode_body(buf, other)?;
            }
        }
        last_id = id;
    }

    buf.put_u8(STOP);
    Ok(())
}

fn encode_elements(buf: &mut BytesMut, elem_type: TType, items: &[Value]) -> Result<(), EncodeError> {
    for item in items {
        if item.ttype() != elem_type {
            return Err(EncodeError::ElementTypeMismatch {
                expected: elem_type,
                found: item.ttype(),
            });
        }
        encode_body(buf, item)?;
    }
    Ok(())
}

fn encode_list(buf: &mut BytesMut, list: &List) -> Result<(), EncodeError> {
    let elem = compact_type(list.elem_type());
    if list.len() < SHORT_SIZE_LIMIT {
        buf.put_u8(((list.len() as u8) << 4) | elem);
    } else {
        buf.put_u8(0xf0 | elem);
        put_size(buf, list.len())?;
    }
    encode_elements(buf, list.elem_type(), list.items())
}

fn encode_map(buf: &mut BytesMut, map: &Map) -> Result<(), EncodeError> {
    if map.is_empty() {
        buf.put_u8(0);
        return Ok(());
    }

    put_size(buf, map.len())?;
    buf.put_u8((compact_type(map.key_type()) << 4) | compact_type(map.value_type()));

    for (key, value) in map.entries() {
        encode_elements(buf, map.key_type(), std::slice::from_ref(key))?;
        encode_elements(buf, map.value_type(), std::slice::from_ref(value))?;
    }
    Ok(())
}

fn encode_body(buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Bool(b) => buf.put_u8(if *b { BOOLEAN_TRUE } else { BOOLEAN_FALSE }),
        Value::Byte(b) => buf.put_i8(*b),
        Value::I16(n) => put_zigzag(buf, i64::from(*n)),
        Value::I32(n) => put_zigzag(buf, i64::from(*n)),
        Value::I64(n) => put_zigzag(buf, *n),
        Value::Double(d) => buf.put_f64_le(*d),
        Value::Binary(bytes) => encode_binary(buf, bytes)?,
        Value::Struct(fields) => encode_struct(buf, fields)?,
        Value::List(list) | Value::Set(list) => encode_list(buf, list)?,
        Value::Map(map) => encode_map(buf, map)?,
    }
    Ok(())
}
