use crate::protocol::{DecodeError, FromValue, IntoValue, Struct, TType, Value, ValueType};
use serde::Serialize;
use std::fmt;

/// Lifecycle state of an indexer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HawkState {
    Running = 0,
    Stopped = 1,
    Updating = 2,
}

impl TryFrom<i32> for HawkState {
    type Error = DecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HawkState::Running),
            1 => Ok(HawkState::Stopped),
            2 => Ok(HawkState::Updating),
            value => Err(DecodeError::UnknownEnumValue {
                name: "HawkState",
                value,
            }),
        }
    }
}

impl fmt::Display for HawkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HawkState::Running => "RUNNING",
            HawkState::Stopped => "STOPPED",
            HawkState::Updating => "UPDATING",
        };
        f.write_str(name)
    }
}

impl ValueType for HawkState {
    const TTYPE: TType = TType::I32;
}

impl FromValue for HawkState {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        HawkState::try_from(i32::from_value(value)?)
    }
}

impl IntoValue for HawkState {
    fn into_value(self) -> Value {
        Value::I32(self as i32)
    }
}

/// An indexer instance hosted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub name: String,
    pub state: HawkState,
    /// Last status message, if the server has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Instance {
    pub fn new(name: impl Into<String>, state: HawkState) -> Self {
        Self {
            name: name.into(),
            state,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ValueType for Instance {
    const TTYPE: TType = TType::Struct;
}

impl FromValue for Instance {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        let mut fields = Struct::from_value(value)?;
        Ok(Self {
            name: fields.take_required(1)?,
            state: fields.take_required(2)?,
            message: fields.take(3)?,
        })
    }
}

impl IntoValue for Instance {
    fn into_value(self) -> Value {
        let mut fields = Struct::new()
            .with_field(1, self.name)
            .with_field(2, self.state);
        if let Some(message) = self.message {
            fields.insert(3, message.into_value());
        }
        Value::Struct(fields)
    }
}

/// Raised by the instance operations when no instance has the requested name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HawkInstanceNotFound;

impl ValueType for HawkInstanceNotFound {
    const TTYPE: TType = TType::Struct;
}

impl FromValue for HawkInstanceNotFound {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        Struct::from_value(value).map(|_| HawkInstanceNotFound)
    }
}

impl IntoValue for HawkInstanceNotFound {
    fn into_value(self) -> Value {
        Value::Struct(Struct::new())
    }
}
