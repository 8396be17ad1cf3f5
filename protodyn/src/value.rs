//! Dynamic values stored in the fields of a [`DynamicMessage`](../message/struct.DynamicMessage.html).

use crate::descriptor::FieldType;
use crate::message::DynamicMessage;

/// A decoded field value.
///
/// Integer variants are shared by the types with the same Rust representation:
/// `I32` holds int32, sint32 and sfixed32 values, `U64` holds uint64 and fixed64 values, and so on.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A bool value
    Bool(bool),
    /// An int32, sint32 or sfixed32 value
    I32(i32),
    /// An int64, sint64 or sfixed64 value
    I64(i64),
    /// A uint32 or fixed32 value
    U32(u32),
    /// A uint64 or fixed64 value
    U64(u64),
    /// A float value
    F32(f32),
    /// A double value
    F64(f64),
    /// A UTF-8 string value
    String(String),
    /// A bytes value
    Bytes(Vec<u8>),
    /// The number of an enum value. This may not be a value listed in the enum's descriptor.
    Enum(i32),
    /// A nested message
    Message(Box<DynamicMessage>),
}

impl Value {
    /// Returns the zero value of a scalar type, or `None` for messages.
    /// Enums default to 0 here; their schema default is their first listed value.
    pub fn zero(ty: &FieldType) -> Option<Value> {
        Some(match ty {
            FieldType::Bool => Value::Bool(false),
            FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => Value::I32(0),
            FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => Value::I64(0),
            FieldType::Uint32 | FieldType::Fixed32 => Value::U32(0),
            FieldType::Uint64 | FieldType::Fixed64 => Value::U64(0),
            FieldType::Float => Value::F32(0.0),
            FieldType::Double => Value::F64(0.0),
            FieldType::String => Value::String(String::new()),
            FieldType::Bytes => Value::Bytes(Vec::new()),
            FieldType::Enum(_) => Value::Enum(0),
            FieldType::Message(_) => return None,
        })
    }

    /// Returns whether this value can be stored in a field of the specified type
    pub fn is_valid_for(&self, ty: &FieldType) -> bool {
        match (self, ty) {
            (Value::Bool(_), FieldType::Bool) => true,
            (Value::I32(_), FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32) => true,
            (Value::I64(_), FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64) => true,
            (Value::U32(_), FieldType::Uint32 | FieldType::Fixed32) => true,
            (Value::U64(_), FieldType::Uint64 | FieldType::Fixed64) => true,
            (Value::F32(_), FieldType::Float) => true,
            (Value::F64(_), FieldType::Double) => true,
            (Value::String(_), FieldType::String) => true,
            (Value::Bytes(_), FieldType::Bytes) => true,
            (Value::Enum(_), FieldType::Enum(_)) => true,
            (Value::Message(m), FieldType::Message(name)) => m.descriptor().full_name() == name,
            _ => false,
        }
    }

    /// Returns the value as a bool
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as an i32
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::I32(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as an i64
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as a u32
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::U32(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as a u64
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as an f32
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::F32(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as an f64
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F64(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as a byte slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the number of an enum value
    pub fn as_enum(&self) -> Option<i32> {
        match *self {
            Value::Enum(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as a nested message
    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }
    /// Returns the value as a mutable nested message
    pub fn as_message_mut(&mut self) -> Option<&mut DynamicMessage> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Value {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<u8> => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_owned())
    }
}

impl From<DynamicMessage> for Value {
    fn from(v: DynamicMessage) -> Value {
        Value::Message(Box::new(v))
    }
}

/// The key of a map field entry. Only integral, bool and string types can be map keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    /// A bool key
    Bool(bool),
    /// An int32, sint32 or sfixed32 key
    I32(i32),
    /// An int64, sint64 or sfixed64 key
    I64(i64),
    /// A uint32 or fixed32 key
    U32(u32),
    /// A uint64 or fixed64 key
    U64(u64),
    /// A string key
    String(String),
}

impl MapKey {
    /// Converts a value to a key, returning `None` for values that can't be keys
    pub fn from_value(value: Value) -> Option<MapKey> {
        Some(match value {
            Value::Bool(v) => MapKey::Bool(v),
            Value::I32(v) => MapKey::I32(v),
            Value::I64(v) => MapKey::I64(v),
            Value::U32(v) => MapKey::U32(v),
            Value::U64(v) => MapKey::U64(v),
            Value::String(v) => MapKey::String(v),
            _ => return None,
        })
    }
    /// Returns whether this key can be used for a map with the specified key type
    pub fn is_valid_for(&self, ty: &FieldType) -> bool {
        self.to_value().is_valid_for(ty)
    }
    /// Converts the key to the equivalent value
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(v) => Value::Bool(*v),
            MapKey::I32(v) => Value::I32(*v),
            MapKey::I64(v) => Value::I64(*v),
            MapKey::U32(v) => Value::U32(*v),
            MapKey::U64(v) => Value::U64(*v),
            MapKey::String(v) => Value::String(v.clone()),
        }
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Value {
        match key {
            MapKey::Bool(v) => Value::Bool(v),
            MapKey::I32(v) => Value::I32(v),
            MapKey::I64(v) => Value::I64(v),
            MapKey::U32(v) => Value::U32(v),
            MapKey::U64(v) => Value::U64(v),
            MapKey::String(v) => Value::String(v),
        }
    }
}

macro_rules! key_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for MapKey {
                fn from(v: $ty) -> MapKey {
                    MapKey::$variant(v)
                }
            }
        )*
    };
}

key_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    String => String,
}

impl From<&str> for MapKey {
    fn from(v: &str) -> MapKey {
        MapKey::String(v.to_owned())
    }
}

#[cfg(test)]
mod test {
    use crate::descriptor::FieldType;
    use super::{MapKey, Value};

    #[test]
    fn value_kinds_match_types() {
        assert!(Value::I32(1).is_valid_for(&FieldType::Sint32));
        assert!(Value::I32(1).is_valid_for(&FieldType::Sfixed32));
        assert!(!Value::I32(1).is_valid_for(&FieldType::Int64));
        assert!(Value::U64(1).is_valid_for(&FieldType::Fixed64));
        assert!(Value::Enum(9).is_valid_for(&FieldType::Enum("a.E".into())));
        assert!(!Value::from("x").is_valid_for(&FieldType::Bytes));
    }
    #[test]
    fn zero_values() {
        assert_eq!(Value::zero(&FieldType::Double), Some(Value::F64(0.0)));
        assert_eq!(Value::zero(&FieldType::Bytes), Some(Value::Bytes(Vec::new())));
        assert_eq!(Value::zero(&FieldType::Message("a.M".into())), None);
    }
    #[test]
    fn map_keys() {
        assert_eq!(MapKey::from_value(Value::from(3u64)), Some(MapKey::U64(3)));
        assert_eq!(MapKey::from_value(Value::F32(1.0)), None);
        assert!(MapKey::from("k").is_valid_for(&FieldType::String));
        assert!(!MapKey::I32(1).is_valid_for(&FieldType::Uint32));
        assert!(MapKey::I32(-1) < MapKey::I32(0));
    }
}
