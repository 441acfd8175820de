//! Decoder configuration
//!
//! Plain settings structs with defaults suited to detector streams.

/// Default upper bound on a single decompressed channel (1 GiB)
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 1 << 30;

/// Message type whose channels carry compressed data
pub const IMAGE_MESSAGE_TYPE: &str = "image";

/// Settings for the built-in decompressor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressConfig {
    /// Largest uncompressed size a container header may declare
    pub max_output_size: usize,
}

impl Default for DecompressConfig {
    fn default() -> Self {
        Self {
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
        }
    }
}

impl DecompressConfig {
    /// Set the maximum declared output size
    pub fn with_max_output_size(mut self, max_output_size: usize) -> Self {
        self.max_output_size = max_output_size;
        self
    }
}

/// Settings for [`crate::Decoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Value of the `type` key that marks a message with channels
    pub image_type: String,
    /// Built-in decompressor settings
    pub decompress: DecompressConfig,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            image_type: IMAGE_MESSAGE_TYPE.to_string(),
            decompress: DecompressConfig::default(),
        }
    }
}

impl DecoderConfig {
    /// Set the image message type
    pub fn with_image_type(mut self, image_type: impl Into<String>) -> Self {
        self.image_type = image_type.into();
        self
    }

    /// Set the decompressor settings
    pub fn with_decompress(mut self, decompress: DecompressConfig) -> Self {
        self.decompress = decompress;
        self
    }
}
