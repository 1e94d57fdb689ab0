//! Horizontal (same row) and vertical (previous row) difference predictors.

use super::{RowPredictor, disjoint};
use crate::error::{Result, TraceError};
use crate::format::access_mask::AccessMask;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Largest byte run `VertDelta8` accepts.
pub const MAX_VERT_DELTA8_COUNT: u32 = 32;

macro_rules! horiz_delta {
    ($name:ident, $tag:literal, $ty:ty, $width:literal, $read:path, $write:path) => {
        #[doc = concat!("Subtract one ", stringify!($ty), " field from another in the same row.")]
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $name {
            dst_offset: u32,
            pred_offset: u32,
        }

        impl $name {
            /// Create a predictor storing `dst - pred` in place of `dst`.
            pub fn new(dst_offset: u32, pred_offset: u32) -> Self {
                Self {
                    dst_offset,
                    pred_offset,
                }
            }

            /// Offset of the field being replaced.
            pub fn dst_offset(&self) -> u32 {
                self.dst_offset
            }

            /// Offset of the field it is predicted from.
            pub fn pred_offset(&self) -> u32 {
                self.pred_offset
            }
        }

        impl RowPredictor for $name {
            const NAME: &'static str = $tag;

            fn validate(&self, mask: &mut AccessMask) -> Result<()> {
                mask.mark_read_write(self.dst_offset, $width)?;
                mask.mark_read(self.pred_offset, $width)?;
                if !disjoint(self.dst_offset, $width, self.pred_offset, $width) {
                    return Err(TraceError::predictor(
                        Self::NAME,
                        "destination overlaps the predicting field",
                    ));
                }
                Ok(())
            }

            fn reset(&mut self) {}

            fn encode(&mut self, rows: &mut [u8], row_size: usize) {
                let (dst, pred) = (self.dst_offset as usize, self.pred_offset as usize);
                for row in rows.chunks_exact_mut(row_size) {
                    let v = $read(&row[dst..]).wrapping_sub($read(&row[pred..]));
                    $write(&mut row[dst..], v);
                }
            }

            fn decode(&mut self, rows: &mut [u8], row_size: usize) {
                let (dst, pred) = (self.dst_offset as usize, self.pred_offset as usize);
                for row in rows.chunks_exact_mut(row_size) {
                    let v = $read(&row[dst..]).wrapping_add($read(&row[pred..]));
                    $write(&mut row[dst..], v);
                }
            }
        }
    };
}

horiz_delta!(
    HorizDelta16,
    "horiz_delta16",
    u16,
    2,
    LittleEndian::read_u16,
    LittleEndian::write_u16
);
horiz_delta!(
    HorizDelta32,
    "horiz_delta32",
    u32,
    4,
    LittleEndian::read_u32,
    LittleEndian::write_u32
);

/// Per-byte difference from the previous row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertDelta8 {
    offset: u32,
    count: u32,
    #[serde(skip)]
    prev: [u8; MAX_VERT_DELTA8_COUNT as usize],
}

impl VertDelta8 {
    /// Create a predictor over `count` bytes at `offset`.
    pub fn new(offset: u32, count: u32) -> Self {
        Self {
            offset,
            count,
            prev: [0; MAX_VERT_DELTA8_COUNT as usize],
        }
    }

    /// First byte covered.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Number of bytes covered.
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl RowPredictor for VertDelta8 {
    const NAME: &'static str = "vert_delta8";

    fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        if self.count == 0 || self.count > MAX_VERT_DELTA8_COUNT {
            return Err(TraceError::predictor(
                Self::NAME,
                format!("count {} outside 1..={}", self.count, MAX_VERT_DELTA8_COUNT),
            ));
        }
        mask.mark_read_write(self.offset, self.count)
    }

    fn reset(&mut self) {
        self.prev = [0; MAX_VERT_DELTA8_COUNT as usize];
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let range = self.offset as usize..(self.offset + self.count) as usize;
        for row in rows.chunks_exact_mut(row_size) {
            for (b, prev) in row[range.clone()].iter_mut().zip(self.prev.iter_mut()) {
                let v = *b;
                *b = v.wrapping_sub(*prev);
                *prev = v;
            }
        }
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let range = self.offset as usize..(self.offset + self.count) as usize;
        for row in rows.chunks_exact_mut(row_size) {
            for (b, prev) in row[range.clone()].iter_mut().zip(self.prev.iter_mut()) {
                *prev = prev.wrapping_add(*b);
                *b = *prev;
            }
        }
    }
}

macro_rules! vert_delta {
    ($name:ident, $tag:literal, $ty:ty, $bias:ty, $width:literal, $read:path, $write:path) => {
        #[doc = concat!(
            "Difference of a ", stringify!($ty),
            " field from its previous value plus a fixed bias."
        )]
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $name {
            offset: u32,
            bias: $bias,
            #[serde(skip)]
            prev: $ty,
        }

        impl $name {
            /// Create a predictor for the field at `offset` expecting it to
            /// grow by `bias` per row.
            pub fn new(offset: u32, bias: $bias) -> Self {
                Self {
                    offset,
                    bias,
                    prev: 0,
                }
            }

            /// Offset of the field.
            pub fn offset(&self) -> u32 {
                self.offset
            }

            /// Expected per-row growth.
            pub fn bias(&self) -> $bias {
                self.bias
            }
        }

        impl RowPredictor for $name {
            const NAME: &'static str = $tag;

            fn validate(&self, mask: &mut AccessMask) -> Result<()> {
                mask.mark_read_write(self.offset, $width)
            }

            fn reset(&mut self) {
                self.prev = 0;
            }

            fn encode(&mut self, rows: &mut [u8], row_size: usize) {
                let at = self.offset as usize;
                let bias = self.bias as $ty;
                for row in rows.chunks_exact_mut(row_size) {
                    let v = $read(&row[at..]);
                    $write(&mut row[at..], v.wrapping_sub(self.prev.wrapping_add(bias)));
                    self.prev = v;
                }
            }

            fn decode(&mut self, rows: &mut [u8], row_size: usize) {
                let at = self.offset as usize;
                let bias = self.bias as $ty;
                for row in rows.chunks_exact_mut(row_size) {
                    let v = $read(&row[at..])
                        .wrapping_add(self.prev)
                        .wrapping_add(bias);
                    $write(&mut row[at..], v);
                    self.prev = v;
                }
            }
        }
    };
}

vert_delta!(
    VertDelta16,
    "vert_delta16",
    u16,
    i16,
    2,
    LittleEndian::read_u16,
    LittleEndian::write_u16
);
vert_delta!(
    VertDelta32,
    "vert_delta32",
    u32,
    i32,
    4,
    LittleEndian::read_u32,
    LittleEndian::write_u32
);

#[cfg(test)]
mod tests {
    use super::super::test_support::{assert_round_trip, noisy_rows};
    use super::*;

    fn u16_rows(pairs: &[(u16, u16)]) -> Vec<u8> {
        pairs
            .iter()
            .flat_map(|(a, b)| a.to_le_bytes().into_iter().chain(b.to_le_bytes()))
            .collect()
    }

    #[test]
    fn horiz_delta_stores_difference() {
        let mut rows = u16_rows(&[(100, 40), (5, 6)]);
        HorizDelta16::new(0, 2).encode(&mut rows, 4);
        assert_eq!(rows, u16_rows(&[(60, 40), (0xFFFF, 6)]));
    }

    #[test]
    fn horiz_delta_round_trips() {
        let rows = noisy_rows(12, 300, 3);
        assert_round_trip(HorizDelta16::new(0, 2).into(), &rows, 12);
        assert_round_trip(HorizDelta32::new(8, 0).into(), &rows, 12);
    }

    #[test]
    fn horiz_delta_rejects_overlap() {
        let mut mask = AccessMask::new(8);
        assert!(HorizDelta16::new(0, 1).validate(&mut mask).is_err());
        assert!(HorizDelta32::new(2, 4).validate(&mut AccessMask::new(8)).is_err());
        assert!(HorizDelta32::new(4, 0).validate(&mut AccessMask::new(8)).is_ok());
    }

    #[test]
    fn vert_delta_with_matching_bias_is_zero() {
        let rows: Vec<u8> = (0u16..10).flat_map(|i| (i * 3).to_le_bytes()).collect();
        let mut buf = rows.clone();
        VertDelta16::new(0, 3).encode(&mut buf, 2);
        // The first row is predicted from 0 + bias.
        assert_eq!(&buf[0..2], &0xFFFDu16.to_le_bytes());
        assert!(buf[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn vert_deltas_round_trip() {
        let rows = noisy_rows(16, 1000, 11);
        assert_round_trip(VertDelta8::new(1, 7).into(), &rows, 16);
        assert_round_trip(VertDelta16::new(0, -5).into(), &rows, 16);
        assert_round_trip(VertDelta32::new(12, 1_000_000).into(), &rows, 16);
    }

    #[test]
    fn vert_delta8_rejects_bad_count() {
        assert!(VertDelta8::new(0, 0).validate(&mut AccessMask::new(64)).is_err());
        assert!(VertDelta8::new(0, 33).validate(&mut AccessMask::new(64)).is_err());
        assert!(VertDelta8::new(30, 4).validate(&mut AccessMask::new(32)).is_err());
    }
}
