//! Zero-suppressing row codec.
//!
//! Each row is written as a little-endian bitmask of its non-zero bytes,
//! using the fewest whole bytes that cover the row (one mask byte per eight
//! row bytes), followed by those bytes in ascending order. An all-zero row
//! costs only its mask.

use super::{RowCodec, simd};
use crate::error::{Result, TraceError};

/// Widest row the sparse codec handles.
pub const MAX_SPARSE_ROW_SIZE: u32 = 32;

/// Non-zero mask plus non-zero bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseCodec;

/// Number of mask bytes for a row.
pub(super) fn mask_len(row_size: usize) -> usize {
    row_size.div_ceil(8)
}

pub(super) fn truncated(row: usize) -> TraceError {
    TraceError::CorruptStream {
        codec: SparseCodec::NAME,
        cause: format!("input ends inside row {}", row),
    }
}

/// Read the row mask at `pos` and reject bits beyond the row width.
pub(super) fn read_mask(input: &[u8], pos: usize, row_size: usize, row: usize) -> Result<u32> {
    let len = mask_len(row_size);
    let bytes = input.get(pos..pos + len).ok_or_else(|| truncated(row))?;
    let mask = bytes
        .iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
    let valid = if row_size >= 32 {
        u32::MAX
    } else {
        (1u32 << row_size) - 1
    };
    if mask & !valid != 0 {
        return Err(TraceError::CorruptStream {
            codec: SparseCodec::NAME,
            cause: format!("row {} marks bytes past width {}", row, row_size),
        });
    }
    Ok(mask)
}

pub(super) fn trailing(pos: usize, len: usize) -> Result<()> {
    if pos != len {
        return Err(TraceError::CorruptStream {
            codec: SparseCodec::NAME,
            cause: format!("{} trailing bytes", len - pos),
        });
    }
    Ok(())
}

/// Reference decoder; [`SparseCodec::decode`] must agree with it bit for bit.
pub(crate) fn decode_scalar(input: &[u8], row_size: usize, out: &mut [u8]) -> Result<()> {
    let mask_bytes = mask_len(row_size);
    let mut pos = 0;
    for (r, row) in out.chunks_exact_mut(row_size).enumerate() {
        let mut mask = read_mask(input, pos, row_size, r)?;
        pos += mask_bytes;

        let n = mask.count_ones() as usize;
        let data = input.get(pos..pos + n).ok_or_else(|| truncated(r))?;
        row.fill(0);
        for &b in data {
            row[mask.trailing_zeros() as usize] = b;
            mask &= mask - 1;
        }
        pos += n;
    }
    trailing(pos, input.len())
}

impl RowCodec for SparseCodec {
    const NAME: &'static str = "sparse";

    fn validate(&self, row_size: u32) -> Result<()> {
        if row_size > MAX_SPARSE_ROW_SIZE {
            return Err(TraceError::UnsupportedGeometry {
                cause: format!(
                    "sparse codec rows are at most {} bytes, got {}",
                    MAX_SPARSE_ROW_SIZE, row_size
                ),
            });
        }
        Ok(())
    }

    fn encode(&self, rows: &[u8], row_size: usize, out: &mut Vec<u8>) -> Result<()> {
        if row_size == 0 || row_size > MAX_SPARSE_ROW_SIZE as usize {
            return Err(TraceError::EncodeGeometry {
                codec: Self::NAME,
                row_size: row_size as u32,
            });
        }
        let mask_bytes = mask_len(row_size);
        out.reserve(rows.len() / 2);

        for row in rows.chunks_exact(row_size) {
            let at = out.len();
            out.extend_from_slice(&[0; 4][..mask_bytes]);
            let mut mask = 0u32;
            for (i, &b) in row.iter().enumerate() {
                if b != 0 {
                    mask |= 1 << i;
                    out.push(b);
                }
            }
            out[at..at + mask_bytes].copy_from_slice(&mask.to_le_bytes()[..mask_bytes]);
        }
        Ok(())
    }

    fn decode(&self, input: &[u8], row_size: usize, out: &mut [u8]) -> Result<()> {
        if row_size == 0 || row_size > MAX_SPARSE_ROW_SIZE as usize {
            return Err(TraceError::UnsupportedGeometry {
                cause: format!("sparse codec cannot decode {}-byte rows", row_size),
            });
        }
        simd::decode(input, row_size, out)
    }
}
