//! # stream-v2 - Detector stream v2 message decoding
//!
//! Decodes CBOR-encoded detector stream messages into typed n-dimensional
//! arrays.
//!
//! ## Key Features
//!
//! - **Typed Arrays**: CBOR typed-array tags (64-87) decoded to [`NdArray`]s
//! - **Multi-dimensional Arrays**: row-major (40) and column-major (1040) reshaping
//! - **Channel Decompression**: `none`, `lz4` and `bslz4` channel payloads
//! - **Forward Compatible**: unknown tags pass through untouched
//!
//! ## Quick Start
//!
//! ```rust
//! use ciborium::Value as Cbor;
//! use stream_v2::{ChannelData, Decoder};
//!
//! // An image message with one uncompressed 2x2 uint16 channel
//! let channel = Cbor::Map(vec![
//!     (
//!         Cbor::Text("data".into()),
//!         Cbor::Array(vec![
//!             Cbor::Array(vec![Cbor::Integer(2u8.into()), Cbor::Integer(2u8.into())]),
//!             Cbor::Bytes(vec![1, 0, 2, 0, 3, 0, 4, 0]),
//!         ]),
//!     ),
//!     (Cbor::Text("compression".into()), Cbor::Text("none".into())),
//!     (Cbor::Text("data_type".into()), Cbor::Text("uint16le".into())),
//! ]);
//! let message = Cbor::Map(vec![
//!     (Cbor::Text("type".into()), Cbor::Text("image".into())),
//!     (Cbor::Text("channels".into()), Cbor::Array(vec![channel])),
//! ]);
//! let mut bytes = Vec::new();
//! ciborium::into_writer(&message, &mut bytes).unwrap();
//!
//! // Decode
//! let decoder = Decoder::new();
//! let decoded = decoder.decode_message(&bytes).unwrap();
//! let array = decoded.channels[0].data.as_decoded().unwrap();
//! assert_eq!(array.shape(), &[2, 2]);
//! # assert!(matches!(decoded.channels[0].data, ChannelData::Decoded(_)));
//! ```
//!
//! ## Modules
//!
//! - [`registry`]: Tag ids and their array decoding rules
//! - [`array`]: Element formats and n-dimensional arrays
//! - [`channel`]: Per-channel decompression dispatch
//! - [`compression`]: Decompressor trait and the HDF5 filter containers
//! - [`message`]: Typed view over a decoded message
//! - [`decoder`]: End-to-end message decoding

// Modules
pub mod array;
pub mod channel;
pub mod compression;
pub mod config;
pub mod decoder;
pub mod error;
pub mod message;
pub mod registry;
pub mod value;

// Re-exports for convenient access
pub use array::{ByteOrder, ElementFormat, ElementKind, Layout, NdArray};
pub use channel::{decompress_channel_data, Channel, ChannelData, DataType};
pub use compression::{Compression, Decompressor, H5Decompressor, Scheme};
pub use config::{DecoderConfig, DecompressConfig};
pub use decoder::Decoder;
pub use error::{ArrayError, ChannelError, DecompressError, Result, StreamError};
pub use message::Message;
pub use registry::{resolve_tags, tag_hook, TagDecoder, REGISTERED_TAGS};
pub use value::Value;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_hook_then_dispatch() {
        // A channel whose data came through the tag hook needs no decompression.
        let typed = tag_hook(registry::tags::UINT8, Value::Bytes(vec![1, 2, 3, 4])).unwrap();
        let shaped = tag_hook(
            registry::tags::MULTI_DIM_ARRAY,
            Value::Array(vec![
                Value::Array(vec![Value::Integer(2), Value::Integer(2)]),
                typed,
            ]),
        )
        .unwrap();

        let channel = Channel::from_value(Value::Map(vec![
            (Value::from("data"), shaped),
            (Value::from("compression"), Value::from("none")),
            (Value::from("data_type"), Value::from("uint8")),
        ]))
        .unwrap();

        let array = decompress_channel_data(&channel, &H5Decompressor::new()).unwrap();
        assert_eq!(array.shape(), &[2, 2]);
    }
}
