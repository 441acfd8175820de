// stream-v2 - Detector stream v2 message decoding
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Channel decompression dispatcher
//!
//! An image message carries one record per detector channel. Each record's
//! `data` is either already decoded (a typed array tag) or a
//! `[dimensions, bytes]` pair that must be decompressed per `compression`
//! and reinterpreted per `data_type`.

use crate::array::{ByteOrder, ElementFormat, Layout, NdArray};
use crate::compression::{Compression, Decompressor};
use crate::error::ChannelError;
use crate::registry::dimensions_from;
use crate::value::{KeyOrder, Value};
use log::debug;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Element type of a channel's encoded bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Unsigned 8-bit
    Uint8,
    /// Unsigned 16-bit little-endian
    Uint16Le,
    /// Unsigned 32-bit little-endian
    Uint32Le,
}

impl DataType {
    /// Name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Uint16Le => "uint16le",
            Self::Uint32Le => "uint32le",
        }
    }

    /// Element width in bytes
    pub fn element_size(&self) -> usize {
        match self {
            Self::Uint8 => 1,
            Self::Uint16Le => 2,
            Self::Uint32Le => 4,
        }
    }

    /// Element decoding format
    pub fn format(&self) -> ElementFormat {
        ElementFormat::unsigned(self.element_size(), ByteOrder::LittleEndian)
    }
}

impl FromStr for DataType {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uint8" => Ok(Self::Uint8),
            "uint16le" => Ok(Self::Uint16Le),
            "uint32le" => Ok(Self::Uint32Le),
            other => Err(ChannelError::UnrecognizedDataType(other.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of a channel's `data` key
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    /// Already an array, nothing left to do
    Decoded(NdArray),
    /// Compressed or raw bytes still to be decoded
    Encoded {
        /// Target shape, row-major
        dimensions: Vec<usize>,
        /// Encoded bytes
        bytes: Vec<u8>,
    },
}

impl ChannelData {
    /// Parse a `data` value
    pub fn from_value(value: Value) -> Result<Self, ChannelError> {
        match value {
            Value::NdArray(array) => Ok(Self::Decoded(array)),
            Value::Array(items) => {
                let [dimensions, bytes] = <[Value; 2]>::try_from(items).map_err(|items| {
                    ChannelError::Malformed(format!(
                        "data must be [dimensions, bytes], got {} items",
                        items.len()
                    ))
                })?;
                let dimensions = dimensions_from(&dimensions)
                    .map_err(|e| ChannelError::Malformed(e.to_string()))?;
                match bytes {
                    Value::Bytes(bytes) => Ok(Self::Encoded { dimensions, bytes }),
                    other => Err(ChannelError::Malformed(format!(
                        "encoded data must be a byte string, got {}",
                        other.kind_name()
                    ))),
                }
            }
            other => Err(ChannelError::Malformed(format!(
                "data must be an array or [dimensions, bytes], got {}",
                other.kind_name()
            ))),
        }
    }

    /// Decoded array, if already resolved
    pub fn as_decoded(&self) -> Option<&NdArray> {
        match self {
            Self::Decoded(array) => Some(array),
            Self::Encoded { .. } => None,
        }
    }

    /// Rebuild the wire-level value
    pub fn into_value(self) -> Value {
        match self {
            Self::Decoded(array) => Value::NdArray(array),
            Self::Encoded { dimensions, bytes } => Value::Array(vec![
                Value::Array(
                    dimensions
                        .into_iter()
                        .map(|d| Value::Integer(d as i128))
                        .collect(),
                ),
                Value::Bytes(bytes),
            ]),
        }
    }
}

/// One channel record of an image message
///
/// `compression` and `data_type` are only required when `data` still needs
/// decoding; a record whose data arrived as a typed array may omit them.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Channel payload
    pub data: ChannelData,
    /// Compression name (`none`, `lz4`, `bslz4`)
    pub compression: Option<String>,
    /// Element type name (`uint8`, `uint16le`, `uint32le`)
    pub data_type: Option<String>,
    /// Remaining keys of the record, in stream order
    pub fields: Vec<(Value, Value)>,
    order: KeyOrder,
}

impl Channel {
    /// Create a channel with no extra fields
    pub fn new(
        data: ChannelData,
        compression: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            data,
            compression: Some(compression.into()),
            data_type: Some(data_type.into()),
            fields: Vec::new(),
            order: KeyOrder::default(),
        }
    }

    /// Create a channel holding an already-decoded array and no metadata
    pub fn decoded(array: NdArray) -> Self {
        Self {
            data: ChannelData::Decoded(array),
            compression: None,
            data_type: None,
            fields: Vec::new(),
            order: KeyOrder::default(),
        }
    }

    /// Parse a channel map
    ///
    /// Encoded data needs text `compression` and `data_type` keys. With decoded
    /// data both are optional, and non-text values are kept in `fields`.
    pub fn from_value(value: Value) -> Result<Self, ChannelError> {
        let entries = match value {
            Value::Map(entries) => entries,
            other => {
                return Err(ChannelError::Malformed(format!(
                    "channel must be a map, got {}",
                    other.kind_name()
                )))
            }
        };

        let decoded = entries
            .iter()
            .find(|(k, _)| k.as_text() == Some("data"))
            .map(|(_, v)| matches!(v, Value::NdArray(_)))
            .ok_or_else(|| missing("data"))?;

        let mut data = None;
        let mut compression = None;
        let mut data_type = None;
        let mut fields = Vec::new();
        let mut order = KeyOrder::default();
        for (key, value) in entries {
            let name = match key.as_text() {
                Some("data") => Some("data"),
                Some("compression") => Some("compression"),
                Some("data_type") => Some("data_type"),
                _ => None,
            };
            match (name, value) {
                (Some("data"), value) if data.is_none() => {
                    data = Some(ChannelData::from_value(value)?);
                    order.push_known("data");
                }
                (Some("compression"), Value::Text(text)) if compression.is_none() => {
                    compression = Some(text);
                    order.push_known("compression");
                }
                (Some("data_type"), Value::Text(text)) if data_type.is_none() => {
                    data_type = Some(text);
                    order.push_known("data_type");
                }
                (Some(name @ ("compression" | "data_type")), other) if !decoded => {
                    return Err(ChannelError::Malformed(format!(
                        "{} must be a text string, got {}",
                        name,
                        other.kind_name()
                    )))
                }
                (_, value) => {
                    fields.push((key, value));
                    order.push_field();
                }
            }
        }

        let data = data.ok_or_else(|| missing("data"))?;
        if !decoded {
            if compression.is_none() {
                return Err(missing("compression"));
            }
            if data_type.is_none() {
                return Err(missing("data_type"));
            }
        }

        Ok(Self {
            data,
            compression,
            data_type,
            fields,
            order,
        })
    }

    /// Rebuild the channel map, keys in their parsed order
    pub fn into_value(self) -> Value {
        let mut known = vec![("data", self.data.into_value())];
        if let Some(compression) = self.compression {
            known.push(("compression", Value::Text(compression)));
        }
        if let Some(data_type) = self.data_type {
            known.push(("data_type", Value::Text(data_type)));
        }
        Value::Map(self.order.rebuild(known, self.fields))
    }

    /// Look up one of the extra fields by text key
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Replace `data` with its decoded array
    ///
    /// `data` is left untouched on error.
    pub fn decompress_in_place<D: Decompressor + ?Sized>(
        &mut self,
        decompressor: &D,
    ) -> Result<(), ChannelError> {
        if let ChannelData::Encoded { dimensions, bytes } = &self.data {
            let array = decode_encoded(
                dimensions,
                bytes,
                self.compression.as_deref(),
                self.data_type.as_deref(),
                decompressor,
            )?;
            self.data = ChannelData::Decoded(array);
        }
        Ok(())
    }
}

fn missing(name: &str) -> ChannelError {
    ChannelError::Malformed(format!("missing key: {}", name))
}

/// Resolve a channel's data to an array
///
/// Already-decoded data is returned as-is. Otherwise `data_type` is resolved
/// first (before any decompression), then `compression`; the decompressed
/// bytes are reinterpreted and reshaped row-major.
pub fn decompress_channel_data<D: Decompressor + ?Sized>(
    channel: &Channel,
    decompressor: &D,
) -> Result<NdArray, ChannelError> {
    match &channel.data {
        ChannelData::Decoded(array) => Ok(array.clone()),
        ChannelData::Encoded { dimensions, bytes } => decode_encoded(
            dimensions,
            bytes,
            channel.compression.as_deref(),
            channel.data_type.as_deref(),
            decompressor,
        ),
    }
}

fn decode_encoded<D: Decompressor + ?Sized>(
    dimensions: &[usize],
    bytes: &[u8],
    compression: Option<&str>,
    data_type: Option<&str>,
    decompressor: &D,
) -> Result<NdArray, ChannelError> {
    let data_type: DataType = data_type.ok_or_else(|| missing("data_type"))?.parse()?;
    let compression: Compression = compression.ok_or_else(|| missing("compression"))?.parse()?;
    debug!(
        "channel: {} bytes, compression {}, data type {}, shape {:?}",
        bytes.len(),
        compression,
        data_type,
        dimensions
    );

    let decompressed = match compression.scheme() {
        None => Cow::Borrowed(bytes),
        Some(scheme) => {
            let element_size = match compression {
                Compression::Bslz4 => Some(data_type.element_size()),
                _ => None,
            };
            Cow::Owned(decompressor.decompress(bytes, scheme, element_size)?)
        }
    };

    let flat = data_type.format().decode(&decompressed)?;
    Ok(flat.reshape(dimensions, Layout::RowMajor)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{compress_bslz4_h5, compress_lz4_h5, H5Decompressor, Scheme};
    use crate::error::{ArrayError, DecompressError};
    use ndarray::array;
    use std::cell::RefCell;

    /// Records every call and returns a fixed result
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(Scheme, Option<usize>)>>,
        output: Vec<u8>,
    }

    impl Decompressor for Recorder {
        fn decompress(
            &self,
            _bytes: &[u8],
            scheme: Scheme,
            element_size: Option<usize>,
        ) -> Result<Vec<u8>, DecompressError> {
            self.calls.borrow_mut().push((scheme, element_size));
            Ok(self.output.clone())
        }
    }

    fn encoded(dimensions: &[usize], bytes: Vec<u8>) -> ChannelData {
        ChannelData::Encoded {
            dimensions: dimensions.to_vec(),
            bytes,
        }
    }

    #[test]
    fn test_data_type_table() {
        assert_eq!("uint8".parse::<DataType>().unwrap().element_size(), 1);
        assert_eq!("uint16le".parse::<DataType>().unwrap().element_size(), 2);
        assert_eq!("uint32le".parse::<DataType>().unwrap().element_size(), 4);
        assert_eq!(DataType::Uint16Le.format().to_string(), "<u2");
        assert_eq!(
            "uint64le".parse::<DataType>().unwrap_err(),
            ChannelError::UnrecognizedDataType("uint64le".to_string())
        );
    }

    #[test]
    fn test_uncompressed_uint16() {
        let channel = Channel::new(
            encoded(&[2, 2], vec![0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00]),
            "none",
            "uint16le",
        );
        let array = decompress_channel_data(&channel, &H5Decompressor::new()).unwrap();
        assert_eq!(array, NdArray::U16(array![[1, 2], [3, 4]].into_dyn()));
    }

    #[test]
    fn test_decoded_fast_path() {
        let decoded = NdArray::U8(array![1, 2, 3].into_dyn());
        // Metadata is not consulted when data is already an array.
        let channel = Channel::new(ChannelData::Decoded(decoded.clone()), "zstd", "uint64le");
        let recorder = Recorder::default();
        assert_eq!(decompress_channel_data(&channel, &recorder).unwrap(), decoded);
        assert!(recorder.calls.borrow().is_empty());
    }

    #[test]
    fn test_bslz4_passes_element_size_from_data_type() {
        for (data_type, width) in [("uint8", 1), ("uint16le", 2), ("uint32le", 4)] {
            let recorder = Recorder {
                output: vec![0; 8 * width],
                ..Default::default()
            };
            let channel = Channel::new(encoded(&[8], vec![0xAA]), "bslz4", data_type);
            decompress_channel_data(&channel, &recorder).unwrap();
            assert_eq!(
                recorder.calls.borrow().as_slice(),
                &[(Scheme::Bslz4H5, Some(width))]
            );
        }
    }

    #[test]
    fn test_lz4_has_no_element_size() {
        let recorder = Recorder {
            output: vec![0; 4],
            ..Default::default()
        };
        let channel = Channel::new(encoded(&[1], vec![0xAA]), "lz4", "uint32le");
        decompress_channel_data(&channel, &recorder).unwrap();
        assert_eq!(recorder.calls.borrow().as_slice(), &[(Scheme::Lz4H5, None)]);
    }

    #[test]
    fn test_unknown_data_type_before_decompression() {
        let recorder = Recorder::default();
        let channel = Channel::new(encoded(&[1], vec![0]), "bslz4", "uint64le");
        let err = decompress_channel_data(&channel, &recorder).unwrap_err();
        assert_eq!(err, ChannelError::UnrecognizedDataType("uint64le".to_string()));
        assert!(recorder.calls.borrow().is_empty());
    }

    #[test]
    fn test_unknown_compression() {
        let channel = Channel::new(encoded(&[1], vec![0]), "zstd", "uint8");
        let err = decompress_channel_data(&channel, &H5Decompressor::new()).unwrap_err();
        assert_eq!(err, ChannelError::UnimplementedCompression("zstd".to_string()));
    }

    #[test]
    fn test_decompression_failure_propagates() {
        let channel = Channel::new(encoded(&[4], vec![1, 2, 3]), "lz4", "uint8");
        let err = decompress_channel_data(&channel, &H5Decompressor::new()).unwrap_err();
        assert_eq!(
            err,
            ChannelError::Decompression(DecompressError::Truncated {
                needed: 12,
                available: 3
            })
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let channel = Channel::new(encoded(&[3, 3], vec![0; 8]), "none", "uint8");
        let err = decompress_channel_data(&channel, &H5Decompressor::new()).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Array(ArrayError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_lz4_and_bslz4_roundtrip() {
        let pixels: Vec<u32> = (0..48).map(|i| i * 1000).collect();
        let raw: Vec<u8> = pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
        let expected = NdArray::U32(
            ndarray::Array::from_shape_vec((6, 8), pixels)
                .unwrap()
                .into_dyn(),
        );
        let decompressor = H5Decompressor::new();

        let lz4 = Channel::new(encoded(&[6, 8], compress_lz4_h5(&raw, 64)), "lz4", "uint32le");
        assert_eq!(decompress_channel_data(&lz4, &decompressor).unwrap(), expected);

        let packed = compress_bslz4_h5(&raw, 4, None).unwrap();
        let bslz4 = Channel::new(encoded(&[6, 8], packed), "bslz4", "uint32le");
        assert_eq!(decompress_channel_data(&bslz4, &decompressor).unwrap(), expected);
    }

    #[test]
    fn test_decompress_in_place() {
        let mut channel = Channel::new(encoded(&[2], vec![5, 6]), "none", "uint8");
        channel.decompress_in_place(&H5Decompressor::new()).unwrap();
        assert_eq!(
            channel.data.as_decoded(),
            Some(&NdArray::U8(array![5, 6].into_dyn()))
        );

        let mut broken = Channel::new(encoded(&[3], vec![5, 6]), "none", "uint8");
        let before = broken.data.clone();
        assert!(broken.decompress_in_place(&H5Decompressor::new()).is_err());
        assert_eq!(broken.data, before);
    }

    #[test]
    fn test_from_value() {
        let value = Value::Map(vec![
            (Value::from("name"), Value::from("threshold_1")),
            (
                Value::from("data"),
                Value::Array(vec![
                    Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
                    Value::Bytes(vec![1, 2]),
                ]),
            ),
            (Value::from("compression"), Value::from("none")),
            (Value::from("data_type"), Value::from("uint8")),
        ]);

        let channel = Channel::from_value(value.clone()).unwrap();
        assert_eq!(channel.data, encoded(&[1, 2], vec![1, 2]));
        assert_eq!(channel.compression.as_deref(), Some("none"));
        assert_eq!(channel.field("name"), Some(&Value::from("threshold_1")));

        // Keys come back in stream order, `name` first.
        assert_eq!(channel.clone().into_value(), value);
        let rebuilt = Channel::from_value(channel.clone().into_value()).unwrap();
        assert_eq!(rebuilt, channel);
    }

    #[test]
    fn test_decoded_data_needs_no_metadata() {
        let array = NdArray::U8(array![[1, 2], [3, 4]].into_dyn());
        let value = Value::Map(vec![(Value::from("data"), Value::NdArray(array.clone()))]);

        let channel = Channel::from_value(value.clone()).unwrap();
        assert_eq!(channel.compression, None);
        assert_eq!(channel.data_type, None);
        assert_eq!(
            decompress_channel_data(&channel, &Recorder::default()).unwrap(),
            array
        );
        assert_eq!(channel.into_value(), value);
        assert_eq!(Channel::decoded(array.clone()).data.as_decoded(), Some(&array));
    }

    #[test]
    fn test_decoded_data_keeps_non_text_metadata() {
        let value = Value::Map(vec![
            (Value::from("compression"), Value::Null),
            (Value::from("data"), Value::NdArray(NdArray::U8(array![1].into_dyn()))),
            (Value::from("data_type"), Value::Integer(8)),
        ]);

        let channel = Channel::from_value(value.clone()).unwrap();
        assert_eq!(channel.compression, None);
        assert_eq!(channel.field("compression"), Some(&Value::Null));
        assert_eq!(channel.field("data_type"), Some(&Value::Integer(8)));
        assert_eq!(channel.into_value(), value);
    }

    #[test]
    fn test_from_value_malformed() {
        let raw = Value::Array(vec![Value::Array(vec![Value::Integer(1)]), Value::Bytes(vec![1])]);

        let missing_type = Value::Map(vec![
            (Value::from("data"), raw.clone()),
            (Value::from("compression"), Value::from("none")),
        ]);
        assert_eq!(
            Channel::from_value(missing_type).unwrap_err(),
            ChannelError::Malformed("missing key: data_type".to_string())
        );

        let numeric_compression = Value::Map(vec![
            (Value::from("data"), raw),
            (Value::from("compression"), Value::Integer(0)),
            (Value::from("data_type"), Value::from("uint8")),
        ]);
        assert_eq!(
            Channel::from_value(numeric_compression).unwrap_err(),
            ChannelError::Malformed("compression must be a text string, got integer".to_string())
        );

        let no_data = Value::Map(vec![(Value::from("compression"), Value::from("none"))]);
        assert_eq!(
            Channel::from_value(no_data).unwrap_err(),
            ChannelError::Malformed("missing key: data".to_string())
        );

        assert!(ChannelData::from_value(Value::Bytes(vec![1])).is_err());
        assert!(ChannelData::from_value(Value::Array(vec![
            Value::Array(vec![Value::Integer(-2)]),
            Value::Bytes(vec![]),
        ]))
        .is_err());
        assert!(Channel::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_encoded_without_metadata_fails_at_dispatch() {
        let mut channel = Channel::new(encoded(&[1], vec![1]), "none", "uint8");
        channel.compression = None;
        assert_eq!(
            decompress_channel_data(&channel, &H5Decompressor::new()).unwrap_err(),
            ChannelError::Malformed("missing key: compression".to_string())
        );
    }
}
