//! Sign-magnitude folding of residuals produced by earlier stages.
//!
//! Residuals cluster around zero, so a small negative value in two's
//! complement has almost every bit set. Folding maps `-1` to `1`, `1` to `2`,
//! `-2` to `3` and so on, which the sparse codec stores far more compactly.

use super::RowPredictor;
use super::basic::{fold16, unfold16};
use crate::error::{Result, TraceError};
use crate::format::access_mask::AccessMask;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Largest field run a sign-magnitude stage accepts.
pub const MAX_SIGN_MAG_COUNT: u32 = 2;

fn fold32(v: u32) -> u32 {
    let v = if v & 0x8000_0000 != 0 { v ^ 0x7FFF_FFFF } else { v };
    v.rotate_left(1)
}

fn unfold32(v: u32) -> u32 {
    let v = v.rotate_right(1);
    if v & 0x8000_0000 != 0 { v ^ 0x7FFF_FFFF } else { v }
}

macro_rules! sign_mag {
    (
        $name:ident, $tag:literal, $width:literal,
        $read:path, $write:path, $fold:ident, $unfold:ident
    ) => {
        #[doc = concat!("Fold `count` consecutive ", stringify!($width), "-byte fields.")]
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $name {
            offset: u32,
            count: u32,
        }

        impl $name {
            /// Create a stage over `count` fields starting at `offset`.
            pub fn new(offset: u32, count: u32) -> Self {
                Self { offset, count }
            }

            /// First byte covered.
            pub fn offset(&self) -> u32 {
                self.offset
            }

            /// Number of fields covered.
            pub fn count(&self) -> u32 {
                self.count
            }

            fn end(&self) -> u32 {
                self.offset.saturating_add(self.count.saturating_mul($width))
            }

            /// Absorb `other` if the two cover adjacent fields and the result
            /// stays within the field limit.
            pub fn try_merge(&mut self, other: &Self) -> bool {
                if self.count + other.count > MAX_SIGN_MAG_COUNT {
                    return false;
                }
                if self.end() != other.offset && other.end() != self.offset {
                    return false;
                }
                self.offset = self.offset.min(other.offset);
                self.count += other.count;
                true
            }
        }

        impl RowPredictor for $name {
            const NAME: &'static str = $tag;

            fn validate(&self, mask: &mut AccessMask) -> Result<()> {
                if self.count == 0 || self.count > MAX_SIGN_MAG_COUNT {
                    return Err(TraceError::predictor(
                        Self::NAME,
                        format!("count {} outside 1..={}", self.count, MAX_SIGN_MAG_COUNT),
                    ));
                }
                mask.mark_read_write(self.offset, self.count * $width)
            }

            fn reset(&mut self) {}

            fn encode(&mut self, rows: &mut [u8], row_size: usize) {
                let span = self.offset as usize..self.end() as usize;
                for row in rows.chunks_exact_mut(row_size) {
                    for field in row[span.clone()].chunks_exact_mut($width) {
                        let v = $read(field);
                        $write(field, $fold(v));
                    }
                }
            }

            fn decode(&mut self, rows: &mut [u8], row_size: usize) {
                let span = self.offset as usize..self.end() as usize;
                for row in rows.chunks_exact_mut(row_size) {
                    for field in row[span.clone()].chunks_exact_mut($width) {
                        let v = $read(field);
                        $write(field, $unfold(v));
                    }
                }
            }
        }
    };
}

sign_mag!(
    SignMag16,
    "sign_mag16",
    2,
    LittleEndian::read_u16,
    LittleEndian::write_u16,
    fold16,
    unfold16
);
sign_mag!(
    SignMag32,
    "sign_mag32",
    4,
    LittleEndian::read_u32,
    LittleEndian::write_u32,
    fold32,
    unfold32
);
