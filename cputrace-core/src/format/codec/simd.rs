//! Sparse decode fast path.
//!
//! Uses SSSE3 `pshufb` on x86_64 when the CPU supports it and falls back to
//! the scalar decoder everywhere else. Each mask byte selects a shuffle that
//! scatters up to eight packed bytes into their row positions in one step.

use super::sparse::decode_scalar;
use crate::error::Result;

/// Decode a sparse stream with the fastest available implementation.
pub(super) fn decode(input: &[u8], row_size: usize, out: &mut [u8]) -> Result<()> {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("ssse3") {
            // SAFETY: the CPU supports SSSE3.
            return unsafe { x86::decode_ssse3(input, row_size, out) };
        }
    }
    decode_scalar(input, row_size, out)
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::super::sparse::{mask_len, read_mask, trailing, truncated};
    use crate::error::Result;
    use std::arch::x86_64::*;

    /// Lane shuffle for every mask byte: lane `i` takes packed byte
    /// `popcount(mask & ((1 << i) - 1))` when bit `i` is set, else zero.
    static SHUFFLE: [[u8; 16]; 256] = build_shuffle();

    const fn build_shuffle() -> [[u8; 16]; 256] {
        let mut table = [[0x80u8; 16]; 256];
        let mut mask = 0;
        while mask < 256 {
            let mut src = 0u8;
            let mut lane = 0;
            while lane < 8 {
                if mask & (1 << lane) != 0 {
                    table[mask][lane] = src;
                    src += 1;
                }
                lane += 1;
            }
            mask += 1;
        }
        table
    }

    #[target_feature(enable = "ssse3")]
    pub(super) unsafe fn decode_ssse3(input: &[u8], row_size: usize, out: &mut [u8]) -> Result<()> {
        let mask_bytes = mask_len(row_size);
        let mut pos = 0;

        for (r, row) in out.chunks_exact_mut(row_size).enumerate() {
            let mask = read_mask(input, pos, row_size, r)?;
            pos += mask_bytes;

            for (g, lanes) in row.chunks_mut(8).enumerate() {
                let bits = (mask >> (g * 8)) as u8;
                let n = bits.count_ones() as usize;

                if pos + 8 <= input.len() {
                    let mut scattered = [0u8; 16];
                    // SAFETY: eight bytes are readable at `pos`, and both
                    // 16-byte buffers are fully owned locals or statics.
                    unsafe {
                        let packed = _mm_loadl_epi64(input.as_ptr().add(pos) as *const __m128i);
                        let shuffle =
                            _mm_loadu_si128(SHUFFLE[bits as usize].as_ptr() as *const __m128i);
                        _mm_storeu_si128(
                            scattered.as_mut_ptr() as *mut __m128i,
                            _mm_shuffle_epi8(packed, shuffle),
                        );
                    }
                    let width = lanes.len();
                    lanes.copy_from_slice(&scattered[..width]);
                } else {
                    let data = input.get(pos..pos + n).ok_or_else(|| truncated(r))?;
                    lanes.fill(0);
                    let mut rest = bits;
                    for &b in data {
                        lanes[rest.trailing_zeros() as usize] = b;
                        rest &= rest - 1;
                    }
                }
                pos += n;
            }
        }
        trailing(pos, input.len())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn shuffle_table_entries() {
            assert_eq!(SHUFFLE[0], [0x80; 16]);
            assert_eq!(&SHUFFLE[0xFF][..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
            assert_eq!(&SHUFFLE[0b1010_0001][..8], &[0, 0x80, 0x80, 0x80, 0x80, 1, 0x80, 2]);
            assert!(SHUFFLE[0xFF][8..].iter().all(|&b| b == 0x80));
        }
    }
}
