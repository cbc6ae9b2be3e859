//! document tree
//!
//! The normalizer hands the emitter a tree made of the following data types
//! - absent (a field that must not appear in the output)
//! - boolean (true/false)
//! - integer (signed, i64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Additionally:
//! - there is no `null`. A value that is not there is [Value::Absent] and gets dropped
//!   together with its key (or its array slot) when rendered.
//! - objects keep insertion order. That order is the key emission order of the document.
//!
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Absent,
    Boolean(bool),
    Integer(i64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// An empty string is treated as "not set"
    pub fn text(value: &str) -> Self {
        if value.is_empty() {
            Value::Absent
        } else {
            value.into()
        }
    }

    /// Array of strings with empty items removed, absent when nothing is left
    pub fn list<S: AsRef<str>>(items: &[S]) -> Self {
        let items: Vec<Value> = items
            .iter()
            .map(AsRef::as_ref)
            .filter(|item| !item.is_empty())
            .map(Value::from)
            .collect();

        Value::array(items)
    }

    /// Absent if `items` is empty
    pub fn array(items: Vec<Value>) -> Self {
        if items.is_empty() {
            Value::Absent
        } else {
            Value::Array(items)
        }
    }

    /// Absent if `entries` holds nothing that would be rendered
    pub fn object(entries: IndexMap<String, Value>) -> Self {
        if entries.values().all(Value::is_absent) {
            Value::Absent
        } else {
            Value::Object(entries)
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up `key` if this is an object
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|object| object.get(key))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<IndexMap<K, V>> for Value {
    fn from(value: IndexMap<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl<K: ToString, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Absent => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let present = value.iter().filter(|element| !element.is_absent());
                let mut ser = serializer.serialize_seq(None)?;
                for element in present {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let present = value.iter().filter(|(_, element)| !element.is_absent());
                let mut ser = serializer.serialize_map(None)?;
                for (element_key, element_value) in present {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}
