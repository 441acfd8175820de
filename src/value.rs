//! Decoded message tree
//!
//! [`Value`] mirrors the CBOR data model, with registered tags replaced by
//! [`NdArray`] leaves and unrecognized tags kept as [`Value::Tag`].

use crate::array::NdArray;

/// A node of a decoded message
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// CBOR null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer (covers the full CBOR major type 0/1 range)
    Integer(i128),
    /// Floating point number
    Float(f64),
    /// Byte string
    Bytes(Vec<u8>),
    /// Text string
    Text(String),
    /// Sequence
    Array(Vec<Value>),
    /// Map, entries kept in stream order
    Map(Vec<(Value, Value)>),
    /// Unrecognized tag, passed through unchanged
    Tag(u64, Box<Value>),
    /// Array produced by a registered tag or by channel decompression
    NdArray(NdArray),
}

impl Value {
    /// Text content, if this is a text string
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Byte content, if this is a byte string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Integer content
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Sequence elements
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Map entries
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Decoded array
    pub fn as_nd_array(&self) -> Option<&NdArray> {
        match self {
            Value::NdArray(array) => Some(array),
            _ => None,
        }
    }

    /// Look up a text key in a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Short name of the variant, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "byte string",
            Value::Text(_) => "text string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Tag(_, _) => "tag",
            Value::NdArray(_) => "typed array",
        }
    }
}

impl From<NdArray> for Value {
    fn from(array: NdArray) -> Self {
        Value::NdArray(array)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

/// Stream order of a parsed map whose known keys were lifted into struct fields
///
/// Each slot is either a known key name or the next entry of the leftover
/// `fields`, so the map can be rebuilt in its original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct KeyOrder(Vec<Option<&'static str>>);

impl KeyOrder {
    pub(crate) fn push_known(&mut self, key: &'static str) {
        self.0.push(Some(key));
    }

    pub(crate) fn push_field(&mut self) {
        self.0.push(None);
    }

    /// Interleave `known` entries and `fields` back into stream order
    ///
    /// Entries with no recorded slot (built in code rather than parsed) are
    /// appended, known entries first.
    pub(crate) fn rebuild(
        &self,
        known: Vec<(&'static str, Value)>,
        fields: Vec<(Value, Value)>,
    ) -> Vec<(Value, Value)> {
        let mut known: Vec<Option<(&'static str, Value)>> = known.into_iter().map(Some).collect();
        let mut fields = fields.into_iter();
        let mut entries = Vec::with_capacity(known.len() + fields.len());

        for slot in &self.0 {
            match slot {
                Some(name) => {
                    let entry = known
                        .iter_mut()
                        .find(|entry| matches!(entry, Some((key, _)) if *key == *name))
                        .and_then(Option::take);
                    if let Some((key, value)) = entry {
                        entries.push((Value::from(key), value));
                    }
                }
                None => entries.extend(fields.next()),
            }
        }

        entries.extend(
            known
                .into_iter()
                .flatten()
                .map(|(key, value)| (Value::from(key), value)),
        );
        entries.extend(fields);
        entries
    }
}
