use std::fmt::Display;

use super::schema::{TypeId, STRING_LEN};
use crate::error::{Result, StorageError};
use crate::storage::common::{DecodeError, Deserializer, Serializer};

#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum Value {
    Integer(i32),
    String(String),
}

impl Value {
    /// parses a value of the given type, consuming exactly `type_id.size()` bytes
    pub(crate) fn parse_value(
        deserializer: &mut Deserializer,
        type_id: TypeId,
    ) -> std::result::Result<Self, DecodeError> {
        match type_id {
            TypeId::Integer => Ok(Value::Integer(deserializer.deserialize_i32()?)),
            TypeId::Text => {
                let len = deserializer.deserialize_i32()?;
                if len < 0 || len as usize > STRING_LEN {
                    return Err(DecodeError::InvalidTextLength(len));
                }
                let bytes = deserializer.read_bytes(STRING_LEN)?;
                let val = std::str::from_utf8(&bytes[..len as usize])?;
                Ok(Value::String(val.to_owned()))
            }
        }
    }

    /// writes exactly `type_id().size()` bytes. Text is padded with zeroes.
    pub(crate) fn serialize_value(&self, serializer: &mut Serializer) {
        match self {
            Value::Integer(val) => serializer.serialize_i32(*val),
            Value::String(val) => {
                let bytes = val.as_bytes();
                serializer.serialize_i32(bytes.len() as i32);
                serializer.copy_bytes(bytes);
                serializer.zeroes(STRING_LEN - bytes.len());
            }
        }
    }

    /// Parses the textual form of a value of the given type
    pub fn parse_text(type_id: TypeId, text: &str) -> Result<Self> {
        match type_id {
            TypeId::Integer => text.trim().parse::<i32>().map(Value::Integer).map_err(|e| {
                StorageError::InvalidValue(format!("'{text}' is not an integer: {e}"))
            }),
            TypeId::Text => Ok(Value::String(text.to_owned())),
        }
    }

    /// The value an unset field is stored as
    pub fn zero(type_id: TypeId) -> Self {
        match type_id {
            TypeId::Integer => Value::Integer(0),
            TypeId::Text => Value::String(String::new()),
        }
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Integer(_) => TypeId::Integer,
            Value::String(_) => TypeId::Text,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(val) => Some(*val),
            _ => None,
        }
    }

}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Integer(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::String(val.to_owned())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(val) => write!(f, "{val}"),
            Value::String(val) => write!(f, "{val}"),
        }
    }
}
