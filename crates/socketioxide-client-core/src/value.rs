//! [`PayloadValue`]: the payload carried by socket.io packets.
use std::{any::Any, borrow::Cow, collections::HashMap};

use bytes::Bytes;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::DeserializeOwned,
    ser::{SerializeMap, SerializeSeq},
};
use serde_json::{Number, Value};

use crate::errors::AttachmentError;

const PLACEHOLDER_KEY: &str = "_placeholder";
const PLACEHOLDER_NUM: &str = "num";

/// Payload value representation, similar to [`serde_json::Value`], that can hold binary payloads.
///
/// In socket.io, binary data is extracted from the JSON payload, replaced by a
/// `{"_placeholder":true,"num":n}` object and sent as separate attachments.
/// A decoded binary packet therefore holds [`PayloadValue::Binary`] nodes with empty bytes
/// until [`PayloadValue::resolve_attachments`] puts the attachments back in place.
///
/// The [`serde::Serialize`] implementation produces the socket.io JSON representation,
/// with binary nodes written as placeholders.
#[derive(Debug, Clone, Eq)]
pub enum PayloadValue {
    /// Represents a JSON `null` value.
    Null,
    /// Represents a JSON boolean value.
    Bool(bool),
    /// Represents a JSON number value.
    ///
    /// Both integers and floats are represented by the [`serde_json::Number`] type.
    Number(Number),
    /// Represents a JSON string value.
    String(String),
    /// Represents a binary payload with its attachment index.
    Binary(usize, Bytes),
    /// Represents a JSON array value.
    Array(Vec<PayloadValue>),
    /// Represents a JSON object value.
    Object(HashMap<String, PayloadValue>),
}

impl PayloadValue {
    /// Convert a `T` into a [`PayloadValue`].
    ///
    /// Byte buffers serialized by `T` end up as arrays of numbers,
    /// use [`PayloadValue::Binary`] (or `From<Bytes>`) to send them as attachments.
    pub fn from_data<T: Serialize>(data: T) -> Result<PayloadValue, serde_json::Error> {
        serde_json::to_value(data).map(PayloadValue::from)
    }

    /// Interpret a [`PayloadValue`] as a `T`.
    ///
    /// Binary nodes are exposed as sequences of bytes so they can be deserialized
    /// into [`Bytes`] or `Vec<u8>`. When `T` is [`PayloadValue`] itself, the value is
    /// returned untouched and keeps its binary nodes.
    pub fn into_data<T: DeserializeOwned + 'static>(self) -> Result<T, serde_json::Error> {
        let mut slot = Some(self);
        if let Some(value) = (&mut slot as &mut dyn Any)
            .downcast_mut::<Option<T>>()
            .and_then(Option::take)
        {
            return Ok(value);
        }
        serde_json::from_value(slot.map_or(Value::Null, PayloadValue::into_raw_json))
    }

    /// Converts `self` to a [`serde_json::Value`]. Binary payloads are converted
    /// to placeholder JSON objects.
    pub fn to_value(&self) -> Value {
        match self {
            PayloadValue::Null => Value::Null,
            PayloadValue::Bool(b) => Value::Bool(*b),
            PayloadValue::Number(n) => Value::Number(n.clone()),
            PayloadValue::String(s) => Value::String(s.clone()),
            PayloadValue::Binary(num, _) => serde_json::json!({ "_placeholder": true, "num": num }),
            PayloadValue::Array(a) => Value::Array(a.iter().map(PayloadValue::to_value).collect()),
            PayloadValue::Object(o) => {
                Value::Object(o.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
            }
        }
    }

    /// Converts `self` to a JSON string. Binary payloads are serialized as placeholder
    /// JSON objects.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn into_raw_json(self) -> Value {
        match self {
            PayloadValue::Null => Value::Null,
            PayloadValue::Bool(b) => Value::Bool(b),
            PayloadValue::Number(n) => Value::Number(n),
            PayloadValue::String(s) => Value::String(s),
            PayloadValue::Binary(_, bin) => {
                Value::Array(bin.iter().map(|b| Value::Number((*b).into())).collect())
            }
            PayloadValue::Array(a) => {
                Value::Array(a.into_iter().map(PayloadValue::into_raw_json).collect())
            }
            PayloadValue::Object(o) => Value::Object(
                o.into_iter()
                    .map(|(k, v)| (k, v.into_raw_json()))
                    .collect(),
            ),
        }
    }

    /// Create a [`PayloadValue`] from a float.
    ///
    /// This may fail, if [`serde_json::Number`] cannot properly represent the number.
    pub fn from_f64(value: f64) -> Option<PayloadValue> {
        Number::from_f64(value).map(PayloadValue::Number)
    }

    /// Interprets `self` as a `bool`, if it contains boolean data.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PayloadValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interprets `self` as a `u64`, if it contains unsigned integer data.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PayloadValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// Interprets `self` as a [`&str`], if it contains string data.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets `self` as a slice of values, if it is an array.
    pub fn as_array(&self) -> Option<&[PayloadValue]> {
        match self {
            PayloadValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Interprets `self` as binary data, if it is a binary node.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadValue::Binary(_, bin) => Some(bin),
            _ => None,
        }
    }

    /// Determines if `self` contains any binary payloads.
    pub fn has_binary(&self) -> bool {
        match self {
            PayloadValue::Binary(_, _) => true,
            PayloadValue::Array(a) => a.iter().any(PayloadValue::has_binary),
            PayloadValue::Object(o) => o.values().any(PayloadValue::has_binary),
            _ => false,
        }
    }

    /// Counts the number of binary payloads (or placeholders) contained in `self`.
    pub fn count_payloads(&self) -> usize {
        match self {
            PayloadValue::Binary(_, _) => 1,
            PayloadValue::Array(a) => a.iter().map(PayloadValue::count_payloads).sum(),
            PayloadValue::Object(o) => o.values().map(PayloadValue::count_payloads).sum(),
            _ => 0,
        }
    }

    /// Returns a list of all binary payloads in `self`, ordered by their attachment index.
    pub fn get_binary_payloads(&self) -> Vec<Bytes> {
        fn rec(data: &PayloadValue, bins: &mut Vec<(usize, Bytes)>) {
            match data {
                PayloadValue::Binary(num, bin) => bins.push((*num, bin.clone())),
                PayloadValue::Array(a) => a.iter().for_each(|v| rec(v, bins)),
                PayloadValue::Object(o) => o.values().for_each(|v| rec(v, bins)),
                _ => (),
            }
        }

        let mut bins = Vec::new();
        rec(self, &mut bins);
        bins.sort_by(|(a, _), (b, _)| a.cmp(b));
        bins.into_iter().map(|(_, bin)| bin).collect()
    }

    /// Renumber every binary node in traversal order and return their payloads,
    /// ordered as they must be sent after the packet header.
    pub fn extract_attachments(&mut self) -> Vec<Bytes> {
        fn rec(data: &mut PayloadValue, bins: &mut Vec<Bytes>) {
            match data {
                PayloadValue::Binary(num, bin) => {
                    *num = bins.len();
                    bins.push(bin.clone());
                }
                PayloadValue::Array(a) => a.iter_mut().for_each(|v| rec(v, bins)),
                PayloadValue::Object(o) => o.values_mut().for_each(|v| rec(v, bins)),
                _ => (),
            }
        }

        let mut bins = Vec::new();
        rec(self, &mut bins);
        bins
    }

    /// Replace every placeholder with the attachment it points to.
    ///
    /// All the attachments must be present: a placeholder pointing past the end of
    /// `attachments` is an error.
    pub fn resolve_attachments(&mut self, attachments: &[Bytes]) -> Result<(), AttachmentError> {
        match self {
            PayloadValue::Binary(num, bin) => {
                *bin = attachments
                    .get(*num)
                    .cloned()
                    .ok_or(AttachmentError::MissingAttachment {
                        num: *num,
                        received: attachments.len(),
                    })?;
                Ok(())
            }
            PayloadValue::Array(a) => a
                .iter_mut()
                .try_for_each(|v| v.resolve_attachments(attachments)),
            PayloadValue::Object(o) => o
                .values_mut()
                .try_for_each(|v| v.resolve_attachments(attachments)),
            _ => Ok(()),
        }
    }
}

/// Placeholder objects are turned into empty [`PayloadValue::Binary`] nodes.
impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PayloadValue::Null,
            Value::Bool(b) => PayloadValue::Bool(b),
            Value::Number(n) => PayloadValue::Number(n),
            Value::String(s) => PayloadValue::String(s),
            Value::Array(a) => PayloadValue::Array(a.into_iter().map(PayloadValue::from).collect()),
            Value::Object(o) => match placeholder_num(&o) {
                Some(num) => PayloadValue::Binary(num, Bytes::new()),
                None => PayloadValue::Object(
                    o.into_iter()
                        .map(|(k, v)| (k, PayloadValue::from(v)))
                        .collect(),
                ),
            },
        }
    }
}

fn placeholder_num(obj: &serde_json::Map<String, Value>) -> Option<usize> {
    if obj.len() != 2 || obj.get(PLACEHOLDER_KEY) != Some(&Value::Bool(true)) {
        return None;
    }
    obj.get(PLACEHOLDER_NUM)?
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
}

impl Serialize for PayloadValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PayloadValue::Null => serializer.serialize_unit(),
            PayloadValue::Bool(b) => serializer.serialize_bool(*b),
            PayloadValue::Number(n) => n.serialize(serializer),
            PayloadValue::String(s) => serializer.serialize_str(s),
            PayloadValue::Binary(num, _) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(PLACEHOLDER_KEY, &true)?;
                map.serialize_entry(PLACEHOLDER_NUM, num)?;
                map.end()
            }
            PayloadValue::Array(a) => {
                let mut seq = serializer.serialize_seq(Some(a.len()))?;
                for v in a {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            PayloadValue::Object(o) => {
                let mut map = serializer.serialize_map(Some(o.len()))?;
                for (k, v) in o {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for PayloadValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(PayloadValue::from)
    }
}

// PartialEq is implemented manually rather than being derived because the binary payload num
// should not be included in the comparison. It's enough that the binary bytes in the node are
// equivalent.
impl PartialEq for PayloadValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PayloadValue::Null, PayloadValue::Null) => true,
            (PayloadValue::Bool(a), PayloadValue::Bool(b)) => a.eq(b),
            (PayloadValue::Number(a), PayloadValue::Number(b)) => a.eq(b),
            (PayloadValue::String(a), PayloadValue::String(b)) => a.eq(b),
            (PayloadValue::Array(a), PayloadValue::Array(b)) => a.eq(b),
            (PayloadValue::Object(a), PayloadValue::Object(b)) => a.eq(b),
            (PayloadValue::Binary(_, a), PayloadValue::Binary(_, b)) => a.eq(b),
            _ => false,
        }
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PayloadValue {
                fn from(value: $ty) -> Self {
                    PayloadValue::Number(value.into())
                }
            }
        )*
    };
}

impl_from_integer!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize);

impl From<()> for PayloadValue {
    fn from(_value: ()) -> Self {
        PayloadValue::Null
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<Number> for PayloadValue {
    fn from(value: Number) -> Self {
        PayloadValue::Number(value)
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::String(value)
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::String(value.to_string())
    }
}

impl<'a> From<Cow<'a, str>> for PayloadValue {
    fn from(value: Cow<'a, str>) -> Self {
        PayloadValue::String(value.into_owned())
    }
}

/// The attachment index is assigned when the packet is built.
impl From<Bytes> for PayloadValue {
    fn from(value: Bytes) -> Self {
        PayloadValue::Binary(0, value)
    }
}

impl From<Vec<PayloadValue>> for PayloadValue {
    fn from(value: Vec<PayloadValue>) -> Self {
        PayloadValue::Array(value)
    }
}

impl From<HashMap<String, PayloadValue>> for PayloadValue {
    fn from(value: HashMap<String, PayloadValue>) -> Self {
        PayloadValue::Object(value)
    }
}
