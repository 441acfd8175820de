//! `lz4-h5` container
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! u64 total uncompressed size
//! u32 block size
//! repeated: u32 compressed size, then that many bytes
//! ```
//!
//! A block whose compressed size equals its uncompressed size is stored raw.
//! The last block holds whatever remains of the total size.

use crate::error::DecompressError;
use log::trace;

/// Size of the container header
pub const HEADER_SIZE: usize = 12;

/// Parsed container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContainerHeader {
    /// Declared uncompressed size
    pub total_size: usize,
    /// Declared block size in bytes
    pub block_size: usize,
}

/// Read the 12-byte header, checking the declared size against `max_output_size`
pub(crate) fn read_header(
    bytes: &[u8],
    max_output_size: usize,
) -> Result<(ContainerHeader, &[u8]), DecompressError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecompressError::Truncated {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    let (header, rest) = bytes.split_at(HEADER_SIZE);

    let mut total = [0u8; 8];
    total.copy_from_slice(&header[..8]);
    let total = u64::from_be_bytes(total);
    let mut block = [0u8; 4];
    block.copy_from_slice(&header[8..]);
    let block = u32::from_be_bytes(block);

    let too_large = DecompressError::OutputTooLarge {
        size: total,
        max: max_output_size,
    };
    let total_size = usize::try_from(total).map_err(|_| too_large.clone())?;
    if total_size > max_output_size {
        return Err(too_large);
    }

    Ok((
        ContainerHeader {
            total_size,
            block_size: block as usize,
        },
        rest,
    ))
}

/// Largest ratio of decoded to encoded bytes an LZ4 block can reach
pub(crate) const MAX_EXPANSION: usize = 255;

/// Reject a declared size the remaining input cannot possibly produce
///
/// `compressed_bytes` of output spread over `blocks` LZ4 blocks need at least
/// a 4-byte prefix per block plus one input byte per [`MAX_EXPANSION`] output
/// bytes; `raw_tail` bytes are copied as-is. Checked before allocating.
pub(crate) fn check_declared_size(
    compressed_bytes: usize,
    blocks: usize,
    raw_tail: usize,
    available: usize,
) -> Result<(), DecompressError> {
    let min_payload = compressed_bytes / MAX_EXPANSION
        + usize::from(compressed_bytes % MAX_EXPANSION != 0);
    let needed = blocks
        .saturating_mul(4)
        .saturating_add(min_payload)
        .saturating_add(raw_tail);
    if available < needed {
        return Err(DecompressError::Truncated { needed, available });
    }
    Ok(())
}

/// Write the 12-byte header
pub(crate) fn write_header(out: &mut Vec<u8>, total_size: usize, block_size: usize) {
    out.extend_from_slice(&(total_size as u64).to_be_bytes());
    out.extend_from_slice(&(block_size as u32).to_be_bytes());
}

/// Split one length-prefixed block off the front of `input`
pub(crate) fn next_block<'a>(input: &mut &'a [u8]) -> Result<&'a [u8], DecompressError> {
    if input.len() < 4 {
        return Err(DecompressError::Truncated {
            needed: 4,
            available: input.len(),
        });
    }
    let mut size = [0u8; 4];
    size.copy_from_slice(&input[..4]);
    let size = u32::from_be_bytes(size) as usize;

    let rest = &input[4..];
    if rest.len() < size {
        return Err(DecompressError::Truncated {
            needed: size,
            available: rest.len(),
        });
    }
    let (block, rest) = rest.split_at(size);
    *input = rest;
    Ok(block)
}

/// LZ4-decode `compressed` into exactly `output.len()` bytes
pub(crate) fn decompress_block(compressed: &[u8], output: &mut [u8]) -> Result<(), DecompressError> {
    let written = lz4_flex::block::decompress_into(compressed, output)?;
    if written != output.len() {
        return Err(DecompressError::SizeMismatch {
            expected: output.len(),
            actual: written,
        });
    }
    Ok(())
}

/// Decompress an `lz4-h5` container
pub fn decompress_lz4_h5(bytes: &[u8], max_output_size: usize) -> Result<Vec<u8>, DecompressError> {
    let (header, mut input) = read_header(bytes, max_output_size)?;
    if header.block_size == 0 && header.total_size > 0 {
        return Err(DecompressError::BlockSizeInvalid { block_size: 0 });
    }
    let block_size = header.block_size.max(1);
    let block_count =
        header.total_size / block_size + usize::from(header.total_size % block_size != 0);
    check_declared_size(header.total_size, block_count, 0, input.len())?;

    let mut output = vec![0u8; header.total_size];
    let mut blocks = 0usize;
    for chunk in output.chunks_mut(block_size) {
        let block = next_block(&mut input)?;
        if block.len() == chunk.len() {
            chunk.copy_from_slice(block);
        } else {
            decompress_block(block, chunk)?;
        }
        blocks += 1;
    }

    trace!(
        "lz4-h5: {} -> {} bytes in {} blocks",
        bytes.len(),
        output.len(),
        blocks
    );
    Ok(output)
}

/// Compress `data` into an `lz4-h5` container with `block_size`-byte blocks
///
/// Blocks that do not shrink are stored raw. A `block_size` of zero or larger
/// than `data` produces a single block.
pub fn compress_lz4_h5(data: &[u8], block_size: usize) -> Vec<u8> {
    let block_size = if block_size == 0 || block_size > data.len() {
        data.len()
    } else {
        block_size
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + data.len() / 2);
    write_header(&mut out, data.len(), block_size);
    for chunk in data.chunks(block_size.max(1)) {
        let compressed = lz4_flex::block::compress(chunk);
        let stored = if compressed.len() < chunk.len() {
            &compressed[..]
        } else {
            chunk
        };
        out.extend_from_slice(&(stored.len() as u32).to_be_bytes());
        out.extend_from_slice(stored);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_roundtrip_compressible() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i / 100) as u8).collect();
        let packed = compress_lz4_h5(&data, 4096);
        assert!(packed.len() < data.len());
        assert_eq!(decompress_lz4_h5(&packed, usize::MAX).unwrap(), data);
    }

    #[test]
    fn test_raw_blocks() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let data: Vec<u8> = (0..1000).map(|_| rng.gen()).collect();
        let packed = compress_lz4_h5(&data, 256);
        assert_eq!(decompress_lz4_h5(&packed, usize::MAX).unwrap(), data);
    }

    #[test]
    fn test_empty() {
        let packed = compress_lz4_h5(&[], 0);
        assert_eq!(packed.len(), HEADER_SIZE);
        assert!(decompress_lz4_h5(&packed, usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_header_layout() {
        let packed = compress_lz4_h5(&[1u8; 300], 128);
        assert_eq!(&packed[..8], &300u64.to_be_bytes());
        assert_eq!(&packed[8..12], &128u32.to_be_bytes());
    }

    #[test]
    fn test_truncated_header() {
        let err = decompress_lz4_h5(&[0, 0, 0], usize::MAX).unwrap_err();
        assert_eq!(
            err,
            DecompressError::Truncated {
                needed: 12,
                available: 3
            }
        );
    }

    #[test]
    fn test_truncated_block() {
        let data = vec![3u8; 512];
        let packed = compress_lz4_h5(&data, 128);
        let cut = &packed[..packed.len() - 2];
        assert!(matches!(
            decompress_lz4_h5(cut, usize::MAX),
            Err(DecompressError::Truncated { .. })
        ));
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let mut bytes = Vec::new();
        write_header(&mut bytes, 16, 0);
        assert_eq!(
            decompress_lz4_h5(&bytes, usize::MAX).unwrap_err(),
            DecompressError::BlockSizeInvalid { block_size: 0 }
        );
    }

    #[test]
    fn test_declared_size_beyond_input_rejected_before_allocating() {
        // 1 GiB in one block cannot come out of 16 bytes of payload.
        let mut bytes = Vec::new();
        write_header(&mut bytes, 1 << 30, 1 << 30);
        bytes.extend_from_slice(&12u32.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        assert_eq!(
            decompress_lz4_h5(&bytes, usize::MAX).unwrap_err(),
            DecompressError::Truncated {
                needed: 4 + 4_210_753,
                available: 16
            }
        );
    }

    #[test]
    fn test_check_declared_size() {
        assert!(check_declared_size(0, 0, 0, 0).is_ok());
        assert!(check_declared_size(255, 1, 0, 5).is_ok());
        assert!(check_declared_size(256, 1, 3, 9).is_ok());
        assert_eq!(
            check_declared_size(256, 1, 3, 8).unwrap_err(),
            DecompressError::Truncated {
                needed: 9,
                available: 8
            }
        );
        assert!(check_declared_size(usize::MAX, usize::MAX, 1, usize::MAX - 1).is_err());
    }

    #[test]
    fn test_corrupt_block() {
        let mut bytes = Vec::new();
        write_header(&mut bytes, 64, 64);
        bytes.extend_from_slice(&3u32.to_be_bytes());
        bytes.extend_from_slice(&[0xF0, 0xFF, 0xFF]);
        assert!(decompress_lz4_h5(&bytes, usize::MAX).is_err());
    }
}
