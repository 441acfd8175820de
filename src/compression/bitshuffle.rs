//! `bslz4-h5` container
//!
//! Same 12-byte header as `lz4-h5`, except the block size counts bytes of a
//! bit-shuffled block (`block_size / element_size` elements, a multiple of 8;
//! zero selects the default block size). Each block is stored as a u32
//! big-endian compressed size followed by an LZ4 block. The final partial
//! block is rounded down to a multiple of 8 elements and the remaining
//! 0..7 elements are appended raw.
//!
//! Within a block of `n` elements the bit-shuffled layout holds
//! `element_size * 8` planes of `n / 8` bytes. Plane `j * 8 + k` collects bit
//! `k` of byte `j` of every element, element `i` at bit `i % 8` of byte `i / 8`.

use super::lz4::{check_declared_size, decompress_block, next_block, read_header, write_header};
use crate::error::DecompressError;
use log::trace;

/// Block sizes are multiples of this many elements
pub const BLOCKED_MULT: usize = 8;

const TARGET_BLOCK_BYTES: usize = 8192;
const MIN_BLOCK_ELEMENTS: usize = 128;

/// Default block size in elements for `element_size`
pub fn default_block_elements(element_size: usize) -> usize {
    let elements = TARGET_BLOCK_BYTES / element_size.max(1);
    let elements = elements - elements % BLOCKED_MULT;
    elements.max(MIN_BLOCK_ELEMENTS)
}

/// Transpose the bits of `input` (a whole number of 8-element groups) into planes
pub fn bitshuffle(input: &[u8], output: &mut [u8], element_size: usize) {
    let count = input.len() / element_size;
    let plane_len = count / BLOCKED_MULT;
    output.fill(0);

    for byte in 0..element_size {
        for bit in 0..8 {
            let plane = &mut output[(byte * 8 + bit) * plane_len..][..plane_len];
            for i in 0..count {
                let value = (input[i * element_size + byte] >> bit) & 1;
                plane[i / 8] |= value << (i % 8);
            }
        }
    }
}

/// Inverse of [`bitshuffle`]
pub fn bitunshuffle(input: &[u8], output: &mut [u8], element_size: usize) {
    let count = output.len() / element_size;
    let plane_len = count / BLOCKED_MULT;
    output.fill(0);

    for byte in 0..element_size {
        for bit in 0..8 {
            let plane = &input[(byte * 8 + bit) * plane_len..][..plane_len];
            for i in 0..count {
                let value = (plane[i / 8] >> (i % 8)) & 1;
                output[i * element_size + byte] |= value << bit;
            }
        }
    }
}

/// Element counts of the shuffled blocks covering `count` elements
fn block_layout(count: usize, block_elements: usize) -> impl Iterator<Item = usize> {
    let full = count / block_elements;
    let last = count % block_elements;
    let last = last - last % BLOCKED_MULT;
    std::iter::repeat(block_elements)
        .take(full)
        .chain((last > 0).then_some(last))
}

fn check_block_elements(block_bytes: usize, element_size: usize) -> Result<usize, DecompressError> {
    if block_bytes == 0 {
        return Ok(default_block_elements(element_size));
    }
    let elements = block_bytes / element_size;
    if block_bytes % element_size != 0 || elements % BLOCKED_MULT != 0 {
        return Err(DecompressError::BlockSizeInvalid {
            block_size: block_bytes,
        });
    }
    Ok(elements)
}

/// Decompress a `bslz4-h5` container of `element_size`-byte elements
pub fn decompress_bslz4_h5(
    bytes: &[u8],
    element_size: usize,
    max_output_size: usize,
) -> Result<Vec<u8>, DecompressError> {
    if element_size == 0 {
        return Err(DecompressError::InvalidElementSize(element_size));
    }
    let (header, mut input) = read_header(bytes, max_output_size)?;
    if header.total_size % element_size != 0 {
        return Err(DecompressError::InvalidElementSize(element_size));
    }
    let block_elements = check_block_elements(header.block_size, element_size)?;

    let count = header.total_size / element_size;
    let full = count / block_elements;
    let last = count % block_elements;
    let last = last - last % BLOCKED_MULT;
    let shuffled = (full * block_elements + last) * element_size;
    check_declared_size(
        shuffled,
        full + usize::from(last > 0),
        header.total_size - shuffled,
        input.len(),
    )?;

    let mut output = vec![0u8; header.total_size];
    let mut scratch = vec![0u8; (block_elements * element_size).min(header.total_size)];
    let mut offset = 0;
    let mut blocks = 0usize;

    for elements in block_layout(count, block_elements) {
        let len = elements * element_size;
        let block = next_block(&mut input)?;
        decompress_block(block, &mut scratch[..len])?;
        bitunshuffle(&scratch[..len], &mut output[offset..offset + len], element_size);
        offset += len;
        blocks += 1;
    }

    let leftover = header.total_size - offset;
    if input.len() < leftover {
        return Err(DecompressError::Truncated {
            needed: leftover,
            available: input.len(),
        });
    }
    output[offset..].copy_from_slice(&input[..leftover]);

    trace!(
        "bslz4-h5: {} -> {} bytes in {} blocks, element size {}",
        bytes.len(),
        output.len(),
        blocks,
        element_size
    );
    Ok(output)
}

/// Compress `data` into a `bslz4-h5` container
///
/// `block_elements` defaults to [`default_block_elements`] and must be a
/// multiple of [`BLOCKED_MULT`].
pub fn compress_bslz4_h5(
    data: &[u8],
    element_size: usize,
    block_elements: Option<usize>,
) -> Result<Vec<u8>, DecompressError> {
    if element_size == 0 || data.len() % element_size != 0 {
        return Err(DecompressError::InvalidElementSize(element_size));
    }
    let block_elements = block_elements.unwrap_or_else(|| default_block_elements(element_size));
    if block_elements == 0 || block_elements % BLOCKED_MULT != 0 {
        return Err(DecompressError::BlockSizeInvalid {
            block_size: block_elements * element_size,
        });
    }

    let count = data.len() / element_size;
    let mut out = Vec::with_capacity(data.len() / 2);
    write_header(&mut out, data.len(), block_elements * element_size);

    let mut shuffled = vec![0u8; (block_elements * element_size).min(data.len())];
    let mut offset = 0;
    for elements in block_layout(count, block_elements) {
        let len = elements * element_size;
        bitshuffle(&data[offset..offset + len], &mut shuffled[..len], element_size);
        let compressed = lz4_flex::block::compress(&shuffled[..len]);
        out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
        out.extend_from_slice(&compressed);
        offset += len;
    }
    out.extend_from_slice(&data[offset..]);
    Ok(out)
}
