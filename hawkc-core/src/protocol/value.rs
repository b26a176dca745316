//! # Values
//!
//! [`Value`] is the schema-less tree every message is decoded into. Strings and binary
//! blobs share the [`Value::Binary`] variant because the wire format does not tell them
//! apart; [`String`] projection checks UTF-8.
//!
//! [`FromValue`] and [`IntoValue`] bridge the tree and typed Rust values.
use super::DecodeError;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// Logical type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TType {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    Binary,
    List,
    Set,
    Map,
    Struct,
}

impl fmt::Display for TType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TType::Bool => "bool",
            TType::Byte => "byte",
            TType::I16 => "i16",
            TType::I32 => "i32",
            TType::I64 => "i64",
            TType::Double => "double",
            TType::Binary => "binary",
            TType::List => "list",
            TType::Set => "set",
            TType::Map => "map",
            TType::Struct => "struct",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    Binary(Bytes),
    Struct(Struct),
    List(List),
    Set(List),
    Map(Map),
}

impl Value {
    /// A UTF-8 string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Binary(Bytes::from(s.into()))
    }

    pub fn ttype(&self) -> TType {
        match self {
            Value::Bool(_) => TType::Bool,
            Value::Byte(_) => TType::Byte,
            Value::I16(_) => TType::I16,
            Value::I32(_) => TType::I32,
            Value::I64(_) => TType::I64,
            Value::Double(_) => TType::Double,
            Value::Binary(_) => TType::Binary,
            Value::Struct(_) => TType::Struct,
            Value::List(_) => TType::List,
            Value::Set(_) => TType::Set,
            Value::Map(_) => TType::Map,
        }
    }

    /// The value as text, if it is a binary holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

/// Fields of a struct, keyed by their numeric id.
///
/// Ids are unique by construction. Iteration is in ascending id order, which is also
/// the order fields are encoded in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    fields: BTreeMap<i16, Value>,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Struct::insert`].
    pub fn with_field(mut self, id: i16, value: impl IntoValue) -> Self {
        self.insert(id, value.into_value());
        self
    }

    /// Sets field `id`, returning the value it replaced.
    pub fn insert(&mut self, id: i16, value: Value) -> Option<Value> {
        self.fields.insert(id, value)
    }

    pub fn contains(&self, id: i16) -> bool {
        self.fields.contains_key(&id)
    }

    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields.get(&id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i16, &Value)> {
        self.fields.iter().map(|(id, value)| (*id, value))
    }

    /// Removes field `id` and projects it onto `T`.
    ///
    /// Returns `Ok(None)` when the field is absent and
    /// [`DecodeError::FieldTypeMismatch`] when it holds a value of another type.
    pub fn take<T: FromValue>(&mut self, id: i16) -> Result<Option<T>, DecodeError> {
        let Some(value) = self.fields.remove(&id) else {
            return Ok(None);
        };

        if value.ttype() != T::TTYPE {
            return Err(DecodeError::FieldTypeMismatch {
                field: id,
                expected: T::TTYPE,
                found: value.ttype(),
            });
        }

        T::from_value(value).map(Some)
    }

    /// Like [`Struct::take`], but a missing field is a [`DecodeError::MissingField`].
    pub fn take_required<T: FromValue>(&mut self, id: i16) -> Result<T, DecodeError> {
        self.take(id)?.ok_or(DecodeError::MissingField(id))
    }
}

impl FromIterator<(i16, Value)> for Struct {
    fn from_iter<I: IntoIterator<Item = (i16, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Elements of a list or set, all of `elem_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    elem_type: TType,
    items: Vec<Value>,
}

impl List {
    pub fn new(elem_type: TType) -> Self {
        Self {
            elem_type,
            items: Vec::new(),
        }
    }

    /// Element types are checked when the list is encoded.
    pub fn with_items(elem_type: TType, items: Vec<Value>) -> Self {
        Self { elem_type, items }
    }

    pub fn push(&mut self, item: Value) {
        self.items.push(item);
    }

    pub fn elem_type(&self) -> TType {
        self.elem_type
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Key/value pairs in the order they were written.
///
/// An empty map carries no types on the wire, so two empty maps compare equal whatever
/// their declared key and value types.
#[derive(Debug, Clone)]
pub struct Map {
    key_type: TType,
    value_type: TType,
    entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new(key_type: TType, value_type: TType) -> Self {
        Self {
            key_type,
            value_type,
            entries: Vec::new(),
        }
    }

    pub fn with_entries(key_type: TType, value_type: TType, entries: Vec<(Value, Value)>) -> Self {
        Self {
            key_type,
            value_type,
            entries,
        }
    }

    pub fn push(&mut self, key: Value, value: Value) {
        self.entries.push((key, value));
    }

    pub fn key_type(&self) -> TType {
        self.key_type
    }

    pub fn value_type(&self) -> TType {
        self.value_type
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(Value, Value)> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.is_empty() && other.entries.is_empty() {
            return true;
        }
        self.key_type == other.key_type
            && self.value_type == other.value_type
            && self.entries == other.entries
    }
}

/// Rust types with a fixed wire type.
pub trait ValueType {
    const TTYPE: TType;
}

/// Projection of a [`Value`] onto a Rust type. Only values of `Self::TTYPE` are accepted.
pub trait FromValue: ValueType + Sized {
    fn from_value(value: Value) -> Result<Self, DecodeError>;
}

/// Conversion of a Rust value into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

fn mismatch(expected: TType, value: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        expected,
        found: value.ttype(),
    }
}

macro_rules! scalar_value {
    ($ty:ty, $variant:ident) => {
        impl ValueType for $ty {
            const TTYPE: TType = TType::$variant;
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, DecodeError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch(Self::TTYPE, &other)),
                }
            }
        }

        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

scalar_value!(bool, Bool);
scalar_value!(i8, Byte);
scalar_value!(i16, I16);
scalar_value!(i32, I32);
scalar_value!(i64, I64);
scalar_value!(f64, Double);
scalar_value!(Bytes, Binary);
scalar_value!(Struct, Struct);

impl ValueType for String {
    const TTYPE: TType = TType::Binary;
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Binary(bytes) => {
                String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
            }
            other => Err(mismatch(Self::TTYPE, &other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl ValueType for &str {
    const TTYPE: TType = TType::Binary;
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl<T> ValueType for Vec<T> {
    const TTYPE: TType = TType::List;
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        let list = match value {
            Value::List(list) => list,
            other => return Err(mismatch(Self::TTYPE, &other)),
        };

        if list.elem_type() != T::TTYPE {
            return Err(DecodeError::TypeMismatch {
                expected: T::TTYPE,
                found: list.elem_type(),
            });
        }

        list.into_items().into_iter().map(T::from_value).collect()
    }
}

impl<T: IntoValue + ValueType> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        let items = self.into_iter().map(IntoValue::into_value).collect();
        Value::List(List::with_items(T::TTYPE, items))
    }
}

impl<K, V> ValueType for BTreeMap<K, V> {
    const TTYPE: TType = TType::Map;
}

impl<K, V> FromValue for BTreeMap<K, V>
where
    K: FromValue + Ord,
    V: FromValue,
{
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        let map = match value {
            Value::Map(map) => map,
            other => return Err(mismatch(Self::TTYPE, &other)),
        };

        if !map.is_empty() {
            for (expected, found) in [(K::TTYPE, map.key_type()), (V::TTYPE, map.value_type())] {
                if expected != found {
                    return Err(DecodeError::TypeMismatch { expected, found });
                }
            }
        }

        map.into_entries()
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}
