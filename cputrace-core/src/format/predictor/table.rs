//! Predictors that remember the last value seen for each value of a key field.

use super::{LookupTable, RowPredictor, disjoint};
use crate::error::{Result, TraceError};
use crate::format::access_mask::AccessMask;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

macro_rules! delta_table_prev8 {
    ($name:ident, $tag:literal, $ty:ty, $width:literal, $read:path, $write:path) => {
        #[doc = concat!(
            "Delta of a ", stringify!($ty),
            " field from the value last stored under the previous row's opcode."
        )]
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct $name {
            value_offset: u32,
            opcode_offset: u32,
            #[serde(skip)]
            table: LookupTable<$ty, 256>,
            #[serde(skip)]
            prev_op: u8,
        }

        impl $name {
            /// Create a predictor for the value at `value_offset` keyed by the
            /// byte at `opcode_offset`.
            pub fn new(value_offset: u32, opcode_offset: u32) -> Self {
                Self {
                    value_offset,
                    opcode_offset,
                    table: LookupTable::default(),
                    prev_op: 0,
                }
            }
        }

        impl RowPredictor for $name {
            const NAME: &'static str = $tag;

            fn validate(&self, mask: &mut AccessMask) -> Result<()> {
                mask.mark_read_write(self.value_offset, $width)?;
                mask.mark_read(self.opcode_offset, 1)?;
                if !disjoint(self.opcode_offset, 1, self.value_offset, $width) {
                    return Err(TraceError::predictor(
                        Self::NAME,
                        "opcode byte lies inside the value",
                    ));
                }
                Ok(())
            }

            fn reset(&mut self) {
                self.table.clear();
                self.prev_op = 0;
            }

            fn encode(&mut self, rows: &mut [u8], row_size: usize) {
                let (at, op_at) = (self.value_offset as usize, self.opcode_offset as usize);
                for row in rows.chunks_exact_mut(row_size) {
                    let v = $read(&row[at..]);
                    let pred = &mut self.table[self.prev_op as usize];
                    $write(&mut row[at..], v.wrapping_sub(*pred));
                    *pred = v;
                    self.prev_op = row[op_at];
                }
            }

            fn decode(&mut self, rows: &mut [u8], row_size: usize) {
                let (at, op_at) = (self.value_offset as usize, self.opcode_offset as usize);
                for row in rows.chunks_exact_mut(row_size) {
                    let pred = &mut self.table[self.prev_op as usize];
                    let v = $read(&row[at..]).wrapping_add(*pred);
                    *pred = v;
                    $write(&mut row[at..], v);
                    self.prev_op = row[op_at];
                }
            }
        }
    };
}

delta_table_prev8!(
    Delta16TablePrev8,
    "delta16_table_prev8",
    u16,
    2,
    LittleEndian::read_u16,
    LittleEndian::write_u16
);
delta_table_prev8!(
    Delta32TablePrev8,
    "delta32_table_prev8",
    u32,
    4,
    LittleEndian::read_u32,
    LittleEndian::write_u32
);

/// XOR a 32-bit field with the value last stored under a byte of the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Xor32Table8 {
    value_offset: u32,
    pred_offset: u32,
    #[serde(skip)]
    table: LookupTable<u32, 256>,
}

impl Xor32Table8 {
    /// Create a predictor for the value at `value_offset` keyed by the byte
    /// at `pred_offset`.
    pub fn new(value_offset: u32, pred_offset: u32) -> Self {
        Self {
            value_offset,
            pred_offset,
            table: LookupTable::default(),
        }
    }
}

impl RowPredictor for Xor32Table8 {
    const NAME: &'static str = "xor32_table8";

    fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        mask.mark_read_write(self.value_offset, 4)?;
        mask.mark_read(self.pred_offset, 1)?;
        if !disjoint(self.pred_offset, 1, self.value_offset, 4) {
            return Err(TraceError::predictor(
                Self::NAME,
                "key byte lies inside the value",
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.table.clear();
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let (at, key_at) = (self.value_offset as usize, self.pred_offset as usize);
        for row in rows.chunks_exact_mut(row_size) {
            let v = LittleEndian::read_u32(&row[at..]);
            let pred = &mut self.table[row[key_at] as usize];
            LittleEndian::write_u32(&mut row[at..], v ^ *pred);
            *pred = v;
        }
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let (at, key_at) = (self.value_offset as usize, self.pred_offset as usize);
        for row in rows.chunks_exact_mut(row_size) {
            let pred = &mut self.table[row[key_at] as usize];
            let v = LittleEndian::read_u32(&row[at..]) ^ *pred;
            *pred = v;
            LittleEndian::write_u32(&mut row[at..], v);
        }
    }
}

/// XOR a 32-bit field with the value last stored under the previous row's PC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Xor32TablePrev16 {
    value_offset: u32,
    pc_offset: u32,
    #[serde(skip)]
    table: LookupTable<u32, 65536>,
    #[serde(skip)]
    prev_pc: u16,
}

impl Xor32TablePrev16 {
    /// Create a predictor for the value at `value_offset` keyed by the PC at
    /// `pc_offset`.
    pub fn new(value_offset: u32, pc_offset: u32) -> Self {
        Self {
            value_offset,
            pc_offset,
            table: LookupTable::default(),
            prev_pc: 0,
        }
    }

    /// Offset of the value.
    pub fn value_offset(&self) -> u32 {
        self.value_offset
    }

    /// Offset of the PC key.
    pub fn pc_offset(&self) -> u32 {
        self.pc_offset
    }
}

impl RowPredictor for Xor32TablePrev16 {
    const NAME: &'static str = "xor32_table_prev16";

    fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        mask.mark_read_write(self.value_offset, 4)?;
        mask.mark_read(self.pc_offset, 2)?;
        if !disjoint(self.pc_offset, 2, self.value_offset, 4) {
            return Err(TraceError::predictor(Self::NAME, "PC overlaps the value"));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.table.clear();
        self.prev_pc = 0;
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let (at, pc_at) = (self.value_offset as usize, self.pc_offset as usize);
        for row in rows.chunks_exact_mut(row_size) {
            let v = LittleEndian::read_u32(&row[at..]);
            let pred = &mut self.table[self.prev_pc as usize];
            LittleEndian::write_u32(&mut row[at..], v ^ *pred);
            *pred = v;
            self.prev_pc = LittleEndian::read_u16(&row[pc_at..]);
        }
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let (at, pc_at) = (self.value_offset as usize, self.pc_offset as usize);
        for row in rows.chunks_exact_mut(row_size) {
            let pred = &mut self.table[self.prev_pc as usize];
            let v = LittleEndian::read_u32(&row[at..]) ^ *pred;
            *pred = v;
            LittleEndian::write_u32(&mut row[at..], v);
            self.prev_pc = LittleEndian::read_u16(&row[pc_at..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{assert_round_trip, noisy_rows};
    use super::*;

    #[test]
    fn tables_round_trip() {
        let rows = noisy_rows(12, 3000, 21);
        assert_round_trip(Delta16TablePrev8::new(0, 11).into(), &rows, 12);
        assert_round_trip(Delta32TablePrev8::new(4, 2).into(), &rows, 12);
        assert_round_trip(Xor32Table8::new(8, 0).into(), &rows, 12);
        assert_round_trip(Xor32TablePrev16::new(0, 6).into(), &rows, 12);
    }

    #[test]
    fn keyed_values_repeat_to_zero() {
        // [value:4][key:1][pad:3]; the value only depends on the key.
        let keys = [1u8, 2, 1, 2, 1, 2];
        let mut rows = Vec::new();
        for &k in &keys {
            rows.extend((u32::from(k) * 0x0101_0101).to_le_bytes());
            rows.extend([k, 0, 0, 0]);
        }
        let mut p = Xor32Table8::new(0, 4);
        p.encode(&mut rows, 8);
        for row in rows.chunks(8).skip(2) {
            assert_eq!(&row[0..4], &[0, 0, 0, 0]);
        }
    }

    #[test]
    fn key_inside_value_is_rejected() {
        let mut mask = AccessMask::new(8);
        assert!(Delta16TablePrev8::new(0, 1).validate(&mut mask).is_err());
        assert!(Delta32TablePrev8::new(0, 3).validate(&mut AccessMask::new(8)).is_err());
        assert!(Xor32Table8::new(2, 5).validate(&mut AccessMask::new(8)).is_err());
        assert!(Xor32TablePrev16::new(2, 1).validate(&mut AccessMask::new(8)).is_err());
        assert!(Xor32TablePrev16::new(2, 6).validate(&mut AccessMask::new(8)).is_ok());
    }
}
