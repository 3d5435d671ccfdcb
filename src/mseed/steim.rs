//! Steim1 and Steim2 decompression.
//!
//! Differential integer compression used by most seismic dataloggers. See
//! Appendix B of the SEED Manual v2.4. Data is organised in 64-byte frames
//! of sixteen 32-bit words; word 0 of each frame holds sixteen 2-bit
//! nibbles describing how the other words are packed. Frame 0 also carries
//! the forward (X₀) and reverse (Xₙ) integration constants in words 1-2.

use super::types::ByteOrder;
use super::{MseedError, Result};

const FRAME_SIZE: usize = 64;
const WORDS_PER_FRAME: usize = 16;

/// How many differences a data word carries, and how wide each one is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Packing {
    count: u32,
    bits: u32,
}

const fn packing(count: u32, bits: u32) -> Option<Packing> {
    Some(Packing { count, bits })
}

fn read_u32(data: &[u8], offset: usize, byte_order: ByteOrder) -> u32 {
    let bytes = [
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ];
    match byte_order {
        ByteOrder::Big => u32::from_be_bytes(bytes),
        ByteOrder::Little => u32::from_le_bytes(bytes),
    }
}

fn nibble(control_word: u32, word_index: usize) -> u8 {
    ((control_word >> (30 - word_index * 2)) & 0x03) as u8
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value as i32).wrapping_shl(shift).wrapping_shr(shift)
}

fn steim1_packing(nibble: u8, _word: u32) -> Result<Option<Packing>> {
    Ok(match nibble {
        0b01 => packing(4, 8),
        0b10 => packing(2, 16),
        0b11 => packing(1, 32),
        _ => None,
    })
}

fn steim2_packing(nibble: u8, word: u32) -> Result<Option<Packing>> {
    let dnib = ((word >> 30) & 0x03) as u8;
    match (nibble, dnib) {
        (0b00, _) => Ok(None),
        (0b01, _) => Ok(packing(4, 8)),
        (0b10, 0b01) => Ok(packing(1, 30)),
        (0b10, 0b10) => Ok(packing(2, 15)),
        (0b10, 0b11) => Ok(packing(3, 10)),
        (0b11, 0b00) => Ok(packing(5, 6)),
        (0b11, 0b01) => Ok(packing(6, 5)),
        (0b11, 0b10) => Ok(packing(7, 4)),
        _ => Err(MseedError::SteimDecode(format!(
            "steim2 nibble={nibble:02b} invalid dnib={dnib:02b}"
        ))),
    }
}

fn decode_frames(
    data: &[u8],
    num_samples: usize,
    byte_order: ByteOrder,
    packing_of: fn(u8, u32) -> Result<Option<Packing>>,
    max_per_word: usize,
) -> Result<Vec<i32>> {
    let num_frames = data.len() / FRAME_SIZE;
    if num_frames == 0 {
        return Err(MseedError::SteimDecode(format!(
            "{} bytes is less than one frame",
            data.len()
        )));
    }
    if num_samples == 0 {
        return Ok(Vec::new());
    }
    // Frame 0 spends two words on X₀ and Xₙ.
    let capacity = (num_frames * (WORDS_PER_FRAME - 1) - 2) * max_per_word;
    if num_samples > capacity {
        return Err(MseedError::SampleCountMismatch {
            expected: num_samples,
            actual: capacity,
        });
    }

    let x0 = read_u32(data, 4, byte_order) as i32;
    let xn = read_u32(data, 8, byte_order) as i32;

    let mut diffs = Vec::with_capacity(num_samples);
    'frames: for frame_idx in 0..num_frames {
        let frame_offset = frame_idx * FRAME_SIZE;
        let control_word = read_u32(data, frame_offset, byte_order);
        // Frame 0 words 1-2 are X₀ and Xₙ.
        let first_word = if frame_idx == 0 { 3 } else { 1 };

        for word_idx in first_word..WORDS_PER_FRAME {
            if diffs.len() >= num_samples {
                break 'frames;
            }
            let word = read_u32(data, frame_offset + word_idx * 4, byte_order);
            let Some(Packing { count, bits }) = packing_of(nibble(control_word, word_idx), word)?
            else {
                continue;
            };
            let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
            for i in 0..count {
                let shift = (count - 1 - i) * bits;
                diffs.push(sign_extend((word >> shift) & mask, bits));
            }
        }
    }

    if diffs.len() < num_samples {
        return Err(MseedError::SampleCountMismatch {
            expected: num_samples,
            actual: diffs.len(),
        });
    }

    // The first difference refers to the previous record; X₀ is the first sample.
    let mut samples = Vec::with_capacity(num_samples);
    samples.push(x0);
    for &diff in &diffs[1..num_samples] {
        let last = samples[samples.len() - 1];
        samples.push(last.wrapping_add(diff));
    }

    if samples[num_samples - 1] != xn {
        log::warn!(
            "steim integration mismatch: last sample {} != reverse constant {}",
            samples[num_samples - 1],
            xn
        );
    }

    Ok(samples)
}

/// Decode Steim1 compressed data into i32 samples.
pub fn decode_steim1(data: &[u8], num_samples: usize, byte_order: ByteOrder) -> Result<Vec<i32>> {
    decode_frames(data, num_samples, byte_order, steim1_packing, 4)
}

/// Decode Steim2 compressed data into i32 samples.
///
/// Extends Steim1 with packings selected by the "dnib" (bits 31-30 of each
/// data word).
pub fn decode_steim2(data: &[u8], num_samples: usize, byte_order: ByteOrder) -> Result<Vec<i32>> {
    decode_frames(data, num_samples, byte_order, steim2_packing, 7)
}
