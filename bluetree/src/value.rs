//! Dynamically typed bus values.
//!
//! [`Value`] covers every type the bus can carry. Cached properties are stored
//! as plain values (variants already unpacked); call bodies may still contain
//! [`Value::Variant`] wrappers produced by a [`Codec`](crate::Codec).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Property name → value, for one interface of one object.
pub type PropertyMap = BTreeMap<String, Value>;
/// Interface name → properties, for one object.
pub type InterfaceMap = BTreeMap<String, PropertyMap>;
/// Object path → interfaces.
pub type ObjectMap = BTreeMap<String, InterfaceMap>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Bool(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Str(String),
    ObjectPath(String),
    Signature(String),
    /// Index into the message's file descriptor list.
    UnixFd(u32),
    Array(Vec<Value>),
    Bytes(Vec<u8>),
    /// Ordered key/value pairs, as received.
    Dict(Vec<(Value, Value)>),
    Struct(Vec<Value>),
    Variant(Box<Variant>),
}

/// A value tagged with its own type signature.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Variant {
    pub signature: String,
    pub value: Value,
}

impl Variant {
    pub fn new(signature: impl Into<String>, value: Value) -> Self {
        Variant {
            signature: signature.into(),
            value,
        }
    }
}

impl Value {
    /// Removes any number of variant layers.
    pub fn inner(&self) -> &Value {
        let mut value = self;
        while let Value::Variant(v) = value {
            value = &v.value;
        }
        value
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.inner() {
            Value::Str(s) | Value::ObjectPath(s) | Value::Signature(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.inner() {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer type that fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self.inner() {
            Value::Byte(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::Int64(v) => Some(v),
            Value::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Looks up a string key in a dictionary value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.inner() {
            Value::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Byte(_) => "byte",
            Value::Bool(_) => "boolean",
            Value::Int16(_) => "int16",
            Value::UInt16(_) => "uint16",
            Value::Int32(_) => "int32",
            Value::UInt32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::ObjectPath(_) => "object path",
            Value::Signature(_) => "signature",
            Value::UnixFd(_) => "unix fd",
            Value::Array(_) => "array",
            Value::Bytes(_) => "byte array",
            Value::Dict(_) => "dict",
            Value::Struct(_) => "struct",
            Value::Variant(_) => "variant",
        }
    }

    /// Builds a string-keyed dictionary.
    pub fn dict<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), v))
                .collect(),
        )
    }

    pub fn variant(signature: impl Into<String>, value: Value) -> Value {
        Value::Variant(Box::new(Variant::new(signature, value)))
    }

    pub fn object_path(path: impl Into<String>) -> Value {
        Value::ObjectPath(path.into())
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from!(
    u8 => Byte,
    bool => Bool,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f64 => Double,
    String => Str,
    Vec<u8> => Bytes,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(v.into_iter().map(Value::Str).collect())
    }
}

impl From<Variant> for Value {
    fn from(v: Variant) -> Self {
        Value::Variant(Box::new(v))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match v {
            Json::Null => Value::Struct(Vec::new()),
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Int64(i),
                (None, Some(u)) => Value::UInt64(u),
                _ => Value::Double(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            Json::Object(o) => Value::dict(o.into_iter().map(|(k, v)| (k, Value::from(v)))),
        }
    }
}

/// Conversion out of a dynamically typed [`Value`].
///
/// Integer conversions only succeed when the value fits without loss.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(Error::decode(format!(
        "{} as {}",
        value.inner().type_name(),
        expected
    )))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.inner().clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().map_or_else(|| mismatch("boolean", value), Ok)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_str()
            .map(str::to_string)
            .map_or_else(|| mismatch("string", value), Ok)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match *value.inner() {
            Value::Double(d) => Ok(d),
            _ => match value.as_i64() {
                Some(i) => Ok(i as f64),
                None => mismatch("double", value),
            },
        }
    }
}

macro_rules! impl_from_value_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self> {
                    let wide = match *value.inner() {
                        Value::UInt64(v) => <$t>::try_from(v).ok(),
                        _ => value.as_i64().and_then(|v| <$t>::try_from(v).ok()),
                    };
                    wide.map_or_else(|| mismatch(stringify!($t), value), Ok)
                }
            }
        )*
    };
}

impl_from_value_int!(u8, i16, u16, i32, u32, i64, u64);

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value.inner() {
            Value::Array(items) | Value::Struct(items) => {
                items.iter().map(T::from_value).collect()
            }
            Value::Bytes(bytes) => bytes
                .iter()
                .map(|b| T::from_value(&Value::Byte(*b)))
                .collect(),
            _ => mismatch("array", value),
        }
    }
}

impl<K, V> FromValue for BTreeMap<K, V>
where
    K: FromValue + Ord,
    V: FromValue,
{
    fn from_value(value: &Value) -> Result<Self> {
        match value.inner() {
            Value::Dict(entries) => entries
                .iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            _ => mismatch("dict", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variant_is_transparent() {
        let v = Value::variant("b", Value::variant("b", Value::Bool(true)));
        assert_eq!(v.as_bool(), Some(true));
        assert!(bool::from_value(&v).unwrap());
    }

    #[test]
    fn test_integer_widening_is_lossless_only() {
        assert_eq!(i64::from_value(&Value::Int16(-42)).unwrap(), -42);
        assert_eq!(u16::from_value(&Value::UInt32(65535)).unwrap(), 65535);
        assert!(u16::from_value(&Value::UInt32(65536)).is_err());
        assert!(u8::from_value(&Value::Int16(-1)).is_err());
        assert_eq!(u64::from_value(&Value::UInt64(u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_bytes_from_byte_array_or_bytes() {
        let packed = Value::Bytes(vec![1, 2, 3]);
        let unpacked = Value::Array(vec![Value::Byte(1), Value::Byte(2), Value::Byte(3)]);
        assert_eq!(Vec::<u8>::from_value(&packed).unwrap(), vec![1, 2, 3]);
        assert_eq!(Vec::<u8>::from_value(&unpacked).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_dict_into_map() {
        let data = Value::Dict(vec![
            (Value::UInt16(76), Value::variant("ay", Value::Bytes(vec![0x02, 0x15]))),
            (Value::UInt16(6), Value::variant("ay", Value::Bytes(vec![0xff]))),
        ]);
        let map = BTreeMap::<u16, Vec<u8>>::from_value(&data).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&76], vec![0x02, 0x15]);
    }

    #[test]
    fn test_mismatch_is_decode_error() {
        let e = String::from_value(&Value::Bool(false)).unwrap_err();
        assert!(matches!(e.kind(), crate::ErrorKind::Decode(_)));
    }

    #[test]
    fn test_from_json() {
        let v = Value::from(json!({"Powered": true, "Class": 7936, "UUIDs": ["180f"]}));
        assert_eq!(v.get("Powered"), Some(&Value::Bool(true)));
        assert_eq!(v.get("Class").and_then(Value::as_i64), Some(7936));
        assert_eq!(
            Vec::<String>::from_value(v.get("UUIDs").unwrap()).unwrap(),
            vec!["180f".to_string()]
        );
    }
}
