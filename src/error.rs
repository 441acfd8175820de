// stream-v2 - Detector stream v2 message decoding
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for stream v2 decoding
//!
//! This module defines all error types used throughout the library.
//! Unrecognized tags are not errors: they pass through as [`crate::Value::Tag`].

use thiserror::Error;

/// Result type alias for message decoding
pub type Result<T> = std::result::Result<T, StreamError>;

/// Main error type for message decoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The byte stream is not valid CBOR
    #[error("CBOR decode error: {0}")]
    Cbor(String),

    /// A registered tag could not be decoded
    #[error("Tag {tag}: {source}")]
    Tag {
        /// Failing tag id
        tag: u64,
        /// Underlying array error
        #[source]
        source: ArrayError,
    },

    /// A channel of an image message could not be decoded
    #[error("Channel {index}: {source}")]
    Channel {
        /// Position of the channel in the message
        index: usize,
        /// Underlying channel error
        #[source]
        source: ChannelError,
    },

    /// The top-level message does not have the expected shape
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

/// Errors while building or reshaping arrays
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArrayError {
    /// Payload does not match what the tag requires
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Product of the dimensions differs from the element count
    #[error("Shape mismatch: dimensions {dimensions:?} need {}, got {element_count} elements", product_label(.dimensions))]
    ShapeMismatch {
        /// Requested dimensions
        dimensions: Vec<usize>,
        /// Elements actually available
        element_count: usize,
    },

    /// Byte string length is not a multiple of the element width
    #[error("Shape mismatch: {length} bytes is not a multiple of element width {element_width}")]
    ByteLengthMismatch {
        /// Byte string length
        length: usize,
        /// Element width in bytes
        element_width: usize,
    },

    /// No element type exists for this kind/width combination
    #[error("Unsupported element format: {kind} with width {width}")]
    UnsupportedFormat {
        /// Element kind name
        kind: &'static str,
        /// Element width in bytes
        width: usize,
    },
}

fn product_label(dimensions: &[usize]) -> String {
    crate::array::element_count(dimensions)
        .map_or_else(|| "an overflowing count of".to_string(), |n| n.to_string())
}

/// Errors while resolving a channel's data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// `data_type` is not in the lookup table
    #[error("Unrecognized data type: {0}")]
    UnrecognizedDataType(String),

    /// `compression` is not one of none, lz4, bslz4
    #[error("Unimplemented compression: {0}")]
    UnimplementedCompression(String),

    /// Channel record is missing keys or has wrongly typed values
    #[error("Malformed channel: {0}")]
    Malformed(String),

    /// Decoded bytes could not be turned into an array
    #[error(transparent)]
    Array(#[from] ArrayError),

    /// The decompressor rejected the bytes
    #[error("Decompression failed: {0}")]
    Decompression(#[from] DecompressError),
}

/// Errors reported by the decompressor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressError {
    /// Input ended before a header or block was complete
    #[error("Truncated input: need at least {needed} bytes, got {available}")]
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Block size in the container header is unusable
    #[error("Invalid block size: {block_size}")]
    BlockSizeInvalid {
        /// Declared block size in bytes
        block_size: usize,
    },

    /// Scheme requires an element size and none was given
    #[error("Element size required for {0}")]
    MissingElementSize(&'static str),

    /// Element size is zero
    #[error("Invalid element size: {0}")]
    InvalidElementSize(usize),

    /// Declared output exceeds the configured maximum
    #[error("Output too large: {size} bytes exceeds maximum {max}")]
    OutputTooLarge {
        /// Declared uncompressed size
        size: u64,
        /// Configured maximum
        max: usize,
    },

    /// Decompressed size differs from what the header declared
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Size declared by the header
        expected: usize,
        /// Size actually produced
        actual: usize,
    },

    /// LZ4 block decoding failed
    #[error("LZ4 error: {0}")]
    Lz4(String),

    /// Scheme name is not known
    #[error("Unknown scheme: {0}")]
    UnknownScheme(String),
}

impl From<ciborium::de::Error<std::io::Error>> for StreamError {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        Self::Cbor(err.to_string())
    }
}

impl From<lz4_flex::block::DecompressError> for DecompressError {
    fn from(err: lz4_flex::block::DecompressError) -> Self {
        Self::Lz4(err.to_string())
    }
}
