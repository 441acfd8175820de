//! Decoder module
//!
//! This module turns raw message bytes into [`Message`]s: CBOR parsing,
//! tag resolution, then channel decompression for image messages.

use crate::compression::{Decompressor, H5Decompressor};
use crate::config::DecoderConfig;
use crate::error::{Result, StreamError};
use crate::message::Message;
use crate::registry::resolve_tags;
use crate::value::Value;
use log::debug;

/// Decoder for stream v2 messages
///
/// Holds no per-message state: one decoder can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Decoder<D = H5Decompressor> {
    decompressor: D,
    config: DecoderConfig,
}

impl Decoder<H5Decompressor> {
    /// Create a decoder with default settings
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a decoder with custom settings
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            decompressor: H5Decompressor::with_config(config.decompress.clone()),
            config,
        }
    }
}

impl Default for Decoder<H5Decompressor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Decompressor> Decoder<D> {
    /// Create a decoder delegating byte decompression to `decompressor`
    pub fn with_decompressor(decompressor: D, config: DecoderConfig) -> Self {
        Self {
            decompressor,
            config,
        }
    }

    /// Current settings
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decompressor in use
    pub fn decompressor(&self) -> &D {
        &self.decompressor
    }

    /// Parse CBOR bytes and resolve every registered tag
    pub fn decode_value(&self, bytes: &[u8]) -> Result<Value> {
        let raw: ciborium::Value = ciborium::from_reader(bytes)?;
        resolve_tags(raw)
    }

    /// Decode a complete message
    ///
    /// Channels of image messages are decompressed in order; the first
    /// failure aborts the whole message.
    pub fn decode_message(&self, bytes: &[u8]) -> Result<Message> {
        let value = self.decode_value(bytes)?;
        let mut message = Message::parse(value, &self.config.image_type)?;
        debug!(
            "message type {} with {} channels",
            message.message_type,
            message.channels.len()
        );
        self.decode_channels(&mut message)?;
        Ok(message)
    }

    /// Decompress every channel of `message` in place
    pub fn decode_channels(&self, message: &mut Message) -> Result<()> {
        for (index, channel) in message.channels.iter_mut().enumerate() {
            channel
                .decompress_in_place(&self.decompressor)
                .map_err(|source| StreamError::Channel { index, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::NdArray;
    use crate::channel::ChannelData;
    use crate::error::ChannelError;
    use ciborium::Value as Cbor;
    use ndarray::array;

    fn encode(value: &Cbor) -> Vec<u8> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes).unwrap();
        bytes
    }

    fn text(s: &str) -> Cbor {
        Cbor::Text(s.to_string())
    }

    fn int(i: u64) -> Cbor {
        Cbor::Integer(i.into())
    }

    fn raw_channel(dimensions: &[u64], bytes: Vec<u8>, compression: &str, data_type: &str) -> Cbor {
        Cbor::Map(vec![
            (
                text("data"),
                Cbor::Array(vec![
                    Cbor::Array(dimensions.iter().map(|&d| int(d)).collect()),
                    Cbor::Bytes(bytes),
                ]),
            ),
            (text("compression"), text(compression)),
            (text("data_type"), text(data_type)),
        ])
    }

    fn image(channels: Vec<Cbor>) -> Cbor {
        Cbor::Map(vec![
            (text("type"), text("image")),
            (text("image_id"), int(12)),
            (text("channels"), Cbor::Array(channels)),
        ])
    }

    #[test]
    fn test_decode_image_message() {
        let decoder = Decoder::new();
        let bytes = encode(&image(vec![raw_channel(
            &[2, 2],
            vec![1, 0, 2, 0, 3, 0, 4, 0],
            "none",
            "uint16le",
        )]));

        let message = decoder.decode_message(&bytes).unwrap();
        assert!(message.is_image());
        assert_eq!(
            message.channels[0].data,
            ChannelData::Decoded(NdArray::U16(array![[1, 2], [3, 4]].into_dyn()))
        );
        assert_eq!(message.get("image_id"), Some(&Value::Integer(12)));
    }

    #[test]
    fn test_decode_non_image_message() {
        let decoder = Decoder::new();
        let bytes = encode(&Cbor::Map(vec![
            (text("type"), text("end")),
            (text("series_id"), int(4)),
        ]));
        let message = decoder.decode_message(&bytes).unwrap();
        assert_eq!(message.message_type, "end");
        assert!(message.channels.is_empty());
    }

    #[test]
    fn test_failing_channel_aborts_message() {
        let decoder = Decoder::new();
        let bytes = encode(&image(vec![
            raw_channel(&[1], vec![1], "none", "uint8"),
            raw_channel(&[1], vec![1], "none", "uint64le"),
        ]));
        let err = decoder.decode_message(&bytes).unwrap_err();
        assert_eq!(
            err,
            StreamError::Channel {
                index: 1,
                source: ChannelError::UnrecognizedDataType("uint64le".to_string())
            }
        );
    }

    #[test]
    fn test_invalid_cbor() {
        let decoder = Decoder::new();
        assert!(matches!(
            decoder.decode_value(&[0xFF, 0x00]),
            Err(StreamError::Cbor(_))
        ));
        assert!(matches!(decoder.decode_value(&[]), Err(StreamError::Cbor(_))));
    }

    #[test]
    fn test_decode_value_passes_unknown_tags() {
        let decoder = Decoder::new();
        let bytes = encode(&Cbor::Tag(999, Box::new(text("future"))));
        assert_eq!(
            decoder.decode_value(&bytes).unwrap(),
            Value::Tag(999, Box::new(Value::from("future")))
        );
    }

    #[test]
    fn test_custom_image_type() {
        let decoder = Decoder::with_config(DecoderConfig::default().with_image_type("frame"));
        let bytes = encode(&Cbor::Map(vec![
            (text("type"), text("frame")),
            (
                text("channels"),
                Cbor::Array(vec![raw_channel(&[2], vec![7, 8], "none", "uint8")]),
            ),
        ]));
        let message = decoder.decode_message(&bytes).unwrap();
        assert!(message.is_image());
        assert_eq!(
            message.channels[0].data.as_decoded(),
            Some(&NdArray::U8(array![7, 8].into_dyn()))
        );
    }

    #[test]
    fn test_decoder_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Decoder>();
    }
}
