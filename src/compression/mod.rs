// stream-v2 - Detector stream v2 message decoding
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Channel compression
//!
//! This module provides:
//! - The `compression` values a channel may carry
//! - The [`Decompressor`] trait the channel dispatcher delegates to
//! - [`H5Decompressor`], implementing the `lz4-h5` and `bslz4-h5` containers

pub mod bitshuffle;
pub mod lz4;

pub use bitshuffle::{compress_bslz4_h5, decompress_bslz4_h5};
pub use lz4::{compress_lz4_h5, decompress_lz4_h5};

use crate::config::DecompressConfig;
use crate::error::{ChannelError, DecompressError};
use std::fmt;
use std::str::FromStr;

/// Compression applied to a channel's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Bytes are used as-is
    None,
    /// LZ4 in the HDF5 filter container
    Lz4,
    /// Bitshuffle + LZ4 in the HDF5 filter container
    Bslz4,
}

impl Compression {
    /// Name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Bslz4 => "bslz4",
        }
    }

    /// Decompressor scheme, `None` when no decompression is needed
    pub fn scheme(&self) -> Option<Scheme> {
        match self {
            Self::None => None,
            Self::Lz4 => Some(Scheme::Lz4H5),
            Self::Bslz4 => Some(Scheme::Bslz4H5),
        }
    }
}

impl FromStr for Compression {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "lz4" => Ok(Self::Lz4),
            "bslz4" => Ok(Self::Bslz4),
            other => Err(ChannelError::UnimplementedCompression(other.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container format understood by a [`Decompressor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// `lz4-h5`: blocked LZ4
    Lz4H5,
    /// `bslz4-h5`: blocked bitshuffle + LZ4, element size required
    Bslz4H5,
}

impl Scheme {
    /// Scheme identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lz4H5 => "lz4-h5",
            Self::Bslz4H5 => "bslz4-h5",
        }
    }
}

impl FromStr for Scheme {
    type Err = DecompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lz4-h5" => Ok(Self::Lz4H5),
            "bslz4-h5" => Ok(Self::Bslz4H5),
            other => Err(DecompressError::UnknownScheme(other.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte decompressor used by the channel dispatcher
pub trait Decompressor {
    /// Decompress `bytes` encoded with `scheme`
    ///
    /// `element_size` is the channel's element width in bytes; schemes that
    /// shuffle by element require it.
    fn decompress(
        &self,
        bytes: &[u8],
        scheme: Scheme,
        element_size: Option<usize>,
    ) -> Result<Vec<u8>, DecompressError>;
}

impl<D: Decompressor + ?Sized> Decompressor for &D {
    fn decompress(
        &self,
        bytes: &[u8],
        scheme: Scheme,
        element_size: Option<usize>,
    ) -> Result<Vec<u8>, DecompressError> {
        (**self).decompress(bytes, scheme, element_size)
    }
}

/// Built-in decompressor for the HDF5 filter containers
#[derive(Debug, Clone, Default)]
pub struct H5Decompressor {
    config: DecompressConfig,
}

impl H5Decompressor {
    /// Create with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom settings
    pub fn with_config(config: DecompressConfig) -> Self {
        Self { config }
    }

    /// Current settings
    pub fn config(&self) -> &DecompressConfig {
        &self.config
    }
}

impl Decompressor for H5Decompressor {
    fn decompress(
        &self,
        bytes: &[u8],
        scheme: Scheme,
        element_size: Option<usize>,
    ) -> Result<Vec<u8>, DecompressError> {
        let max = self.config.max_output_size;
        match scheme {
            Scheme::Lz4H5 => decompress_lz4_h5(bytes, max),
            Scheme::Bslz4H5 => {
                let element_size =
                    element_size.ok_or(DecompressError::MissingElementSize(scheme.as_str()))?;
                decompress_bslz4_h5(bytes, element_size, max)
            }
        }
    }
}

/// Decompress `bytes` with the scheme named `scheme` using default settings
pub fn decompress(
    bytes: &[u8],
    scheme: &str,
    element_size: Option<usize>,
) -> Result<Vec<u8>, DecompressError> {
    H5Decompressor::new().decompress(bytes, scheme.parse()?, element_size)
}
