//! Heterogeneous request values
//!
//! [`Value`] is the closed set of shapes a request can take. It lets one
//! literal mix integers, strings, UIDs and nested containers, and it is what
//! JSON requests are parsed into.

use std::rc::Rc;

use serde_json::Value as Json;

use crate::context::SourceKit;
use crate::convertible::SourceKitObjectConvertible;
use crate::error::SourceKitError;
use crate::object::SourceKitObject;
use crate::uid::{RawStringValue, RequestKind, Uid};

/// JSON object key marking a UID value: `{"$uid": "source.request.cursorinfo"}`
pub const UID_MARKER: &str = "$uid";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    String(String),
    /// UID value, by name; interned on conversion
    Uid(String),
    Array(Vec<Value>),
    /// Entries in insertion order, keys interned on conversion
    Dictionary(Vec<(String, Value)>),
    /// Already converted object
    Object(Rc<SourceKitObject>),
    /// Converts to nothing; a null slot inside a container
    Null,
}

impl Value {
    pub fn uid(name: impl Into<String>) -> Self {
        Value::Uid(name.into())
    }

    /// Parse a JSON request document.
    pub fn from_json_str(text: &str) -> Result<Self, SourceKitError> {
        let json: Json = serde_json::from_str(text)?;
        Self::try_from(json)
    }
}

impl SourceKitObjectConvertible for Value {
    fn sourcekitd_object(&self, sk: &SourceKit) -> Option<Rc<SourceKitObject>> {
        match self {
            Value::Int(value) => value.sourcekitd_object(sk),
            Value::String(value) => value.sourcekitd_object(sk),
            Value::Uid(name) => sk.uid(name).sourcekitd_object(sk),
            Value::Array(items) => items.sourcekitd_object(sk),
            Value::Dictionary(entries) => {
                let (keys, values): (Vec<Uid>, Vec<_>) = entries
                    .iter()
                    .map(|(key, value)| (sk.uid(key), value.sourcekitd_object(sk)))
                    .unzip();
                SourceKitObject::dictionary(sk, &keys, values)
            }
            Value::Object(object) => Some(Rc::clone(object)),
            Value::Null => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Uid> for Value {
    fn from(value: Uid) -> Self {
        Value::Uid(value.name().to_owned())
    }
}

impl From<RequestKind> for Value {
    fn from(kind: RequestKind) -> Self {
        Value::Uid(kind.raw_value().to_owned())
    }
}

impl From<Rc<SourceKitObject>> for Value {
    fn from(value: Rc<SourceKitObject>) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// JSON → request value
///
/// - integers must fit in an int64; floats are rejected
/// - booleans become 0 / 1, `null` a null slot
/// - `{"$uid": "name"}` is a UID value, any other object a dictionary
///   (document order preserved)
impl TryFrom<Json> for Value {
    type Error = SourceKitError;

    fn try_from(json: Json) -> Result<Self, Self::Error> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(value) => Ok(Value::from(value)),
            Json::Number(number) => number
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| SourceKitError::UnsupportedNumber(number.to_string())),
            Json::String(value) => Ok(Value::String(value)),
            Json::Array(items) => items
                .into_iter()
                .map(Value::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Json::Object(map) => {
                if let Some(marker) = map.get(UID_MARKER) {
                    if map.len() != 1 {
                        return Err(SourceKitError::InvalidRequest(format!(
                            "'{UID_MARKER}' object must have exactly one entry"
                        )));
                    }
                    return match marker {
                        Json::String(name) => Ok(Value::Uid(name.clone())),
                        other => Err(SourceKitError::InvalidRequest(format!(
                            "'{UID_MARKER}' must name a UID, found {other}"
                        ))),
                    };
                }
                map.into_iter()
                    .map(|(key, value)| Ok((key, Value::try_from(value)?)))
                    .collect::<Result<Vec<_>, SourceKitError>>()
                    .map(Value::Dictionary)
            }
        }
    }
}
