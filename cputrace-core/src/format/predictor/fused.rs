//! Single-pass replacements for common stage sequences.
//!
//! These are built by the fusion pass and produce bit-identical output to
//! the stages they replace. They are never written to a manifest.

use super::{LookupTable, RowPredictor, disjoint};
use crate::error::{Result, TraceError};
use crate::format::access_mask::AccessMask;
use byteorder::{ByteOrder, LittleEndian};

/// `HorizDelta16(offset, offset + 2)` then `VertDelta16(offset, bias)` and
/// `VertDelta16(offset + 2, bias)`, in decode order.
#[derive(Debug, Clone)]
pub struct HvDelta16x2 {
    offset: u32,
    bias: i16,
    prev: [u16; 2],
}

impl HvDelta16x2 {
    /// Create a fused stage over the two 16-bit fields at `offset`.
    pub fn new(offset: u32, bias: i16) -> Self {
        Self {
            offset,
            bias,
            prev: [0; 2],
        }
    }
}

impl RowPredictor for HvDelta16x2 {
    const NAME: &'static str = "hv_delta16x2";

    fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        mask.mark_read_write(self.offset, 4)
    }

    fn reset(&mut self) {
        self.prev = [0; 2];
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let at = self.offset as usize;
        let bias = self.bias as u16;
        for row in rows.chunks_exact_mut(row_size) {
            let v1 = LittleEndian::read_u16(&row[at..]);
            let v2 = LittleEndian::read_u16(&row[at + 2..]);
            let d1 = v1.wrapping_sub(self.prev[0].wrapping_add(bias));
            let d2 = v2.wrapping_sub(self.prev[1].wrapping_add(bias));
            LittleEndian::write_u16(&mut row[at..], d1.wrapping_sub(d2));
            LittleEndian::write_u16(&mut row[at + 2..], d2);
            self.prev = [v1, v2];
        }
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let at = self.offset as usize;
        let bias = self.bias as u16;
        for row in rows.chunks_exact_mut(row_size) {
            let x1 = LittleEndian::read_u16(&row[at..]);
            let x2 = LittleEndian::read_u16(&row[at + 2..]);
            let v1 = x1
                .wrapping_add(x2)
                .wrapping_add(self.prev[0])
                .wrapping_add(bias);
            let v2 = x2.wrapping_add(self.prev[1]).wrapping_add(bias);
            LittleEndian::write_u16(&mut row[at..], v1);
            LittleEndian::write_u16(&mut row[at + 2..], v2);
            self.prev = [v1, v2];
        }
    }
}

/// `Xor32TablePrev16(value, pc)` then `VertDelta8(value, 4)`, in decode order.
#[derive(Debug, Clone)]
pub struct Xor32VertDeltaTablePrev16 {
    value_offset: u32,
    pc_offset: u32,
    table: LookupTable<u32, 65536>,
    prev_pc: u16,
    prev_value: [u8; 4],
}

impl Xor32VertDeltaTablePrev16 {
    /// Create a fused stage for the value at `value_offset` keyed by the PC
    /// at `pc_offset`.
    pub fn new(value_offset: u32, pc_offset: u32) -> Self {
        Self {
            value_offset,
            pc_offset,
            table: LookupTable::default(),
            prev_pc: 0,
            prev_value: [0; 4],
        }
    }
}

fn bytewise_sub(a: [u8; 4], b: [u8; 4]) -> [u8; 4] {
    std::array::from_fn(|i| a[i].wrapping_sub(b[i]))
}

fn bytewise_add(a: [u8; 4], b: [u8; 4]) -> [u8; 4] {
    std::array::from_fn(|i| a[i].wrapping_add(b[i]))
}

impl RowPredictor for Xor32VertDeltaTablePrev16 {
    const NAME: &'static str = "xor32_vert_delta_table_prev16";

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
        self.prev_value = [0; 4];
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let (at, pc_at) = (self.value_offset as usize, self.pc_offset as usize);
        for row in rows.chunks_exact_mut(row_size) {
            let mut v = [0u8; 4];
            v.copy_from_slice(&row[at..at + 4]);
            let delta = LittleEndian::read_u32(&bytewise_sub(v, self.prev_value));
            self.prev_value = v;

            let pred = &mut self.table[self.prev_pc as usize];
            LittleEndian::write_u32(&mut row[at..], delta ^ *pred);
            *pred = delta;
            self.prev_pc = LittleEndian::read_u16(&row[pc_at..]);
        }
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let (at, pc_at) = (self.value_offset as usize, self.pc_offset as usize);
        for row in rows.chunks_exact_mut(row_size) {
            let pred = &mut self.table[self.prev_pc as usize];
            let delta = LittleEndian::read_u32(&row[at..]) ^ *pred;
            *pred = delta;
            self.prev_pc = LittleEndian::read_u16(&row[pc_at..]);

            let v = bytewise_add(self.prev_value, delta.to_le_bytes());
            row[at..at + 4].copy_from_slice(&v);
            self.prev_value = v;
        }
    }
}
