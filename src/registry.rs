// stream-v2 - Detector stream v2 message decoding
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Tag decode registry
//!
//! Maps CBOR tag ids to array decoding rules:
//! - Multi-dimensional arrays (tags 40 and 1040)
//! - Typed arrays (tags 64 to 87)
//!
//! The mapping is a fixed `match`, so lookups need no shared state and are
//! safe from any number of threads. Tags outside the table pass through as
//! [`Value::Tag`] so newer senders keep working with this decoder.

use crate::array::{ByteOrder, ElementFormat, Layout, NdArray};
use crate::error::{ArrayError, StreamError};
use crate::value::Value;
use ciborium::Value as CborValue;
use log::{debug, trace};

/// Registered tag ids
pub mod tags {
    /// Multi-dimensional array, row-major order
    pub const MULTI_DIM_ARRAY: u64 = 40;
    /// Multi-dimensional array, column-major order
    pub const MULTI_DIM_ARRAY_COLUMN_MAJOR: u64 = 1040;

    /// uint8
    pub const UINT8: u64 = 64;
    /// uint16, big-endian
    pub const UINT16_BE: u64 = 65;
    /// uint32, big-endian
    pub const UINT32_BE: u64 = 66;
    /// uint64, big-endian
    pub const UINT64_BE: u64 = 67;
    /// uint8, clamped (decoded exactly like [`UINT8`])
    pub const UINT8_CLAMPED: u64 = 68;
    /// uint16, little-endian
    pub const UINT16_LE: u64 = 69;
    /// uint32, little-endian
    pub const UINT32_LE: u64 = 70;
    /// uint64, little-endian
    pub const UINT64_LE: u64 = 71;

    /// sint8
    pub const SINT8: u64 = 72;
    /// sint16, big-endian
    pub const SINT16_BE: u64 = 73;
    /// sint32, big-endian
    pub const SINT32_BE: u64 = 74;
    /// sint64, big-endian
    pub const SINT64_BE: u64 = 75;
    /// sint16, little-endian
    pub const SINT16_LE: u64 = 77;
    /// sint32, little-endian
    pub const SINT32_LE: u64 = 78;
    /// sint64, little-endian
    pub const SINT64_LE: u64 = 79;

    /// binary16, big-endian
    pub const FLOAT16_BE: u64 = 80;
    /// binary32, big-endian
    pub const FLOAT32_BE: u64 = 81;
    /// binary64, big-endian
    pub const FLOAT64_BE: u64 = 82;
    /// binary128, big-endian
    pub const FLOAT128_BE: u64 = 83;
    /// binary16, little-endian
    pub const FLOAT16_LE: u64 = 84;
    /// binary32, little-endian
    pub const FLOAT32_LE: u64 = 85;
    /// binary64, little-endian
    pub const FLOAT64_LE: u64 = 86;
    /// binary128, little-endian
    pub const FLOAT128_LE: u64 = 87;
}

/// Every tag id with a decoding rule
pub const REGISTERED_TAGS: [u64; 25] = [
    tags::MULTI_DIM_ARRAY,
    tags::UINT8,
    tags::UINT16_BE,
    tags::UINT32_BE,
    tags::UINT64_BE,
    tags::UINT8_CLAMPED,
    tags::UINT16_LE,
    tags::UINT32_LE,
    tags::UINT64_LE,
    tags::SINT8,
    tags::SINT16_BE,
    tags::SINT32_BE,
    tags::SINT64_BE,
    tags::SINT16_LE,
    tags::SINT32_LE,
    tags::SINT64_LE,
    tags::FLOAT16_BE,
    tags::FLOAT32_BE,
    tags::FLOAT64_BE,
    tags::FLOAT128_BE,
    tags::FLOAT16_LE,
    tags::FLOAT32_LE,
    tags::FLOAT64_LE,
    tags::FLOAT128_LE,
    tags::MULTI_DIM_ARRAY_COLUMN_MAJOR,
];

/// Decoding rule for a registered tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDecoder {
    /// `[dimensions, contents]` reshaped in the given order
    MultiDimArray(Layout),
    /// Byte string reinterpreted as fixed-width elements
    TypedArray(ElementFormat),
}

impl TagDecoder {
    /// Find the rule for a tag id
    pub fn lookup(tag: u64) -> Option<Self> {
        use ByteOrder::{BigEndian as Be, LittleEndian as Le};

        let decoder = match tag {
            tags::MULTI_DIM_ARRAY => Self::MultiDimArray(Layout::RowMajor),
            tags::MULTI_DIM_ARRAY_COLUMN_MAJOR => Self::MultiDimArray(Layout::ColumnMajor),
            tags::UINT8 => Self::TypedArray(ElementFormat::unsigned(1, Be)),
            tags::UINT8_CLAMPED => Self::TypedArray(ElementFormat::unsigned(1, Le)),
            tags::UINT16_BE => Self::TypedArray(ElementFormat::unsigned(2, Be)),
            tags::UINT32_BE => Self::TypedArray(ElementFormat::unsigned(4, Be)),
            tags::UINT64_BE => Self::TypedArray(ElementFormat::unsigned(8, Be)),
            tags::UINT16_LE => Self::TypedArray(ElementFormat::unsigned(2, Le)),
            tags::UINT32_LE => Self::TypedArray(ElementFormat::unsigned(4, Le)),
            tags::UINT64_LE => Self::TypedArray(ElementFormat::unsigned(8, Le)),
            tags::SINT8 => Self::TypedArray(ElementFormat::signed(1, Be)),
            tags::SINT16_BE => Self::TypedArray(ElementFormat::signed(2, Be)),
            tags::SINT32_BE => Self::TypedArray(ElementFormat::signed(4, Be)),
            tags::SINT64_BE => Self::TypedArray(ElementFormat::signed(8, Be)),
            tags::SINT16_LE => Self::TypedArray(ElementFormat::signed(2, Le)),
            tags::SINT32_LE => Self::TypedArray(ElementFormat::signed(4, Le)),
            tags::SINT64_LE => Self::TypedArray(ElementFormat::signed(8, Le)),
            tags::FLOAT16_BE => Self::TypedArray(ElementFormat::float(2, Be)),
            tags::FLOAT32_BE => Self::TypedArray(ElementFormat::float(4, Be)),
            tags::FLOAT64_BE => Self::TypedArray(ElementFormat::float(8, Be)),
            tags::FLOAT128_BE => Self::TypedArray(ElementFormat::float(16, Be)),
            tags::FLOAT16_LE => Self::TypedArray(ElementFormat::float(2, Le)),
            tags::FLOAT32_LE => Self::TypedArray(ElementFormat::float(4, Le)),
            tags::FLOAT64_LE => Self::TypedArray(ElementFormat::float(8, Le)),
            tags::FLOAT128_LE => Self::TypedArray(ElementFormat::float(16, Le)),
            _ => return None,
        };
        Some(decoder)
    }

    /// Apply this rule to a tag payload
    pub fn decode(&self, payload: Value) -> Result<NdArray, ArrayError> {
        match self {
            Self::MultiDimArray(layout) => decode_multi_dim_array(payload, *layout),
            Self::TypedArray(format) => decode_typed_array(payload, format),
        }
    }
}

/// Decode one tagged value
///
/// Returns the constructed array for registered tags, or the tagged value
/// unchanged (as [`Value::Tag`]) for any other id.
pub fn tag_hook(tag: u64, payload: Value) -> Result<Value, ArrayError> {
    match TagDecoder::lookup(tag) {
        Some(decoder) => {
            let array = decoder.decode(payload)?;
            trace!("tag {} -> {}", tag, array);
            Ok(Value::NdArray(array))
        }
        None => {
            debug!("passing through unrecognized tag {}", tag);
            Ok(Value::Tag(tag, Box::new(payload)))
        }
    }
}

/// Convert a parsed CBOR tree, running [`tag_hook`] on every tag
///
/// Children are resolved before their parent, in stream order, so a typed
/// array nested in a multi-dimensional array tag reaches the outer rule as
/// an already-flat [`NdArray`].
pub fn resolve_tags(raw: CborValue) -> Result<Value, StreamError> {
    let value = match raw {
        CborValue::Null => Value::Null,
        CborValue::Bool(b) => Value::Bool(b),
        CborValue::Integer(i) => Value::Integer(i128::from(i)),
        CborValue::Float(f) => Value::Float(f),
        CborValue::Bytes(b) => Value::Bytes(b),
        CborValue::Text(s) => Value::Text(s),
        CborValue::Array(items) => Value::Array(
            items
                .into_iter()
                .map(resolve_tags)
                .collect::<Result<_, _>>()?,
        ),
        CborValue::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| Ok((resolve_tags(k)?, resolve_tags(v)?)))
                .collect::<Result<_, StreamError>>()?,
        ),
        CborValue::Tag(tag, inner) => {
            let payload = resolve_tags(*inner)?;
            tag_hook(tag, payload).map_err(|source| StreamError::Tag { tag, source })?
        }
        other => {
            return Err(StreamError::Cbor(format!(
                "unsupported CBOR item: {:?}",
                other
            )))
        }
    };
    Ok(value)
}

/// Read a dimensions list: a sequence (or integer array) of non-negative integers
pub(crate) fn dimensions_from(value: &Value) -> Result<Vec<usize>, ArrayError> {
    let integers: Vec<i128> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_integer().ok_or_else(|| {
                    ArrayError::MalformedPayload(format!(
                        "dimension must be an integer, got {}",
                        item.kind_name()
                    ))
                })
            })
            .collect::<Result<_, _>>()?,
        Value::NdArray(array) => array.to_integers().ok_or_else(|| {
            ArrayError::MalformedPayload(format!("dimensions must be integers, got {}", array))
        })?,
        other => {
            return Err(ArrayError::MalformedPayload(format!(
                "expected dimensions array, got {}",
                other.kind_name()
            )))
        }
    };

    integers
        .into_iter()
        .map(|d| {
            usize::try_from(d).map_err(|_| {
                ArrayError::MalformedPayload(format!("invalid dimension: {}", d))
            })
        })
        .collect()
}

fn decode_multi_dim_array(payload: Value, layout: Layout) -> Result<NdArray, ArrayError> {
    let [dimensions, contents] = match payload {
        Value::Array(items) => <[Value; 2]>::try_from(items).map_err(|items| {
            ArrayError::MalformedPayload(format!(
                "expected [dimensions, contents], got {} items",
                items.len()
            ))
        })?,
        other => {
            return Err(ArrayError::MalformedPayload(format!(
                "expected [dimensions, contents], got {}",
                other.kind_name()
            )))
        }
    };

    let dimensions = dimensions_from(&dimensions)?;
    let array = match contents {
        Value::Array(items) => NdArray::from_values(items),
        Value::NdArray(array) => array,
        other => {
            return Err(ArrayError::MalformedPayload(format!(
                "expected array or typed array, got {}",
                other.kind_name()
            )))
        }
    };
    array.reshape(&dimensions, layout)
}

fn decode_typed_array(payload: Value, format: &ElementFormat) -> Result<NdArray, ArrayError> {
    match payload {
        Value::Bytes(bytes) => format.decode(&bytes),
        other => Err(ArrayError::MalformedPayload(format!(
            "expected byte string in typed array, got {}",
            other.kind_name()
        ))),
    }
}
