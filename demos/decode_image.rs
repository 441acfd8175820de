//! Image message decoding example
//!
//! This example builds an image message the way a detector stream would
//! send it (one bslz4 channel, one lz4 channel and a flatfield typed array
//! in a start message), then decodes both messages.
//!
//! Run with: `cargo run --example decode_image`

use ciborium::Value as Cbor;
use stream_v2::compression::{compress_bslz4_h5, compress_lz4_h5};
use stream_v2::registry::tags;
use stream_v2::{ChannelData, Decoder, NdArray};

const ROWS: usize = 64;
const COLS: usize = 80;

fn text(s: &str) -> Cbor {
    Cbor::Text(s.to_string())
}

fn encode(value: &Cbor) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).expect("encoding to a Vec cannot fail");
    bytes
}

/// Simulated photon counts for one threshold
fn counts(threshold: u32) -> Vec<u8> {
    (0..(ROWS * COLS) as u32)
        .flat_map(|i| {
            let spot = (i % COLS as u32).abs_diff(COLS as u32 / 2) < 3;
            let value = if spot { 900 / threshold } else { i % 2 };
            (value as u16).to_le_bytes()
        })
        .collect()
}

fn channel(name: &str, packed: Vec<u8>, compression: &str) -> Cbor {
    Cbor::Map(vec![
        (
            text("data"),
            Cbor::Array(vec![
                Cbor::Array(vec![
                    Cbor::Integer((ROWS as u64).into()),
                    Cbor::Integer((COLS as u64).into()),
                ]),
                Cbor::Bytes(packed),
            ]),
        ),
        (text("compression"), text(compression)),
        (text("data_type"), text("uint16le")),
        (text("name"), text(name)),
    ])
}

fn main() {
    println!("=== Stream v2 decoding demo ===\n");

    let decoder = Decoder::new();

    // Start message: series metadata with a float32 flatfield
    let flatfield: Vec<u8> = (0..4).flat_map(|i| (1.0f32 + i as f32 * 0.01).to_le_bytes()).collect();
    let start = encode(&Cbor::Map(vec![
        (text("type"), text("start")),
        (text("series_id"), Cbor::Integer(7u8.into())),
        (
            text("flatfield"),
            Cbor::Tag(
                tags::MULTI_DIM_ARRAY,
                Box::new(Cbor::Array(vec![
                    Cbor::Array(vec![Cbor::Integer(2u8.into()), Cbor::Integer(2u8.into())]),
                    Cbor::Tag(tags::FLOAT32_LE, Box::new(Cbor::Bytes(flatfield))),
                ])),
            ),
        ),
    ]));

    match decoder.decode_message(&start) {
        Ok(message) => {
            println!("Message type: {}", message.message_type);
            if let Some(flatfield) = message.get("flatfield").and_then(|v| v.as_nd_array()) {
                println!("  flatfield: {}", flatfield);
            }
        }
        Err(e) => println!("Failed to decode start message: {}", e),
    }

    // Image message: two thresholds, differently compressed
    let low = counts(1);
    let high = counts(3);
    let image = encode(&Cbor::Map(vec![
        (text("type"), text("image")),
        (text("series_id"), Cbor::Integer(7u8.into())),
        (text("image_id"), Cbor::Integer(0u8.into())),
        (
            text("channels"),
            Cbor::Array(vec![
                channel(
                    "threshold_1",
                    compress_bslz4_h5(&low, 2, None).expect("2-byte elements are valid"),
                    "bslz4",
                ),
                channel("threshold_2", compress_lz4_h5(&high, 4096), "lz4"),
            ]),
        ),
    ]));
    println!("\nImage message: {} bytes on the wire", image.len());

    let message = match decoder.decode_message(&image) {
        Ok(message) => message,
        Err(e) => {
            println!("Failed to decode image message: {}", e);
            return;
        }
    };

    for channel in &message.channels {
        let name = channel
            .field("name")
            .and_then(|v| v.as_text())
            .unwrap_or("?");
        match &channel.data {
            ChannelData::Decoded(NdArray::U16(array)) => {
                let total: u64 = array.iter().map(|&v| u64::from(v)).sum();
                let max = array.iter().copied().max().unwrap_or(0);
                println!(
                    "  {} ({}): shape {:?}, total counts {}, max {}",
                    name,
                    channel.compression.as_deref().unwrap_or("none"),
                    array.shape(),
                    total,
                    max
                );
            }
            other => println!("  {}: unexpected data {:?}", name, other),
        }
    }

    println!("\n=== Demo Complete ===");
}
