//! Register, address, PC and instruction-byte predictors.

use super::{LookupTable, RowPredictor, disjoint};
use crate::error::{Result, TraceError};
use crate::format::access_mask::AccessMask;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Largest field `Xor` accepts.
pub const MAX_XOR_SIZE: u32 = 32;

/// Largest instruction `Insn` accepts.
pub const MAX_INSN_SIZE: u32 = 8;

/// XOR each byte with the same byte of the previous row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Xor {
    offset: u32,
    size: u32,
    #[serde(skip)]
    prev: [u8; MAX_XOR_SIZE as usize],
}

impl Xor {
    /// Create a predictor over `size` bytes at `offset`.
    pub fn new(offset: u32, size: u32) -> Self {
        Self {
            offset,
            size,
            prev: [0; MAX_XOR_SIZE as usize],
        }
    }
}

impl RowPredictor for Xor {
    const NAME: &'static str = "xor";

    fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        if self.size == 0 || self.size > MAX_XOR_SIZE {
            return Err(TraceError::predictor(
                Self::NAME,
                format!("size {} outside 1..={}", self.size, MAX_XOR_SIZE),
            ));
        }
        mask.mark_read_write(self.offset, self.size)
    }

    fn reset(&mut self) {
        self.prev = [0; MAX_XOR_SIZE as usize];
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let range = self.offset as usize..(self.offset + self.size) as usize;
        for row in rows.chunks_exact_mut(row_size) {
            for (b, prev) in row[range.clone()].iter_mut().zip(self.prev.iter_mut()) {
                let c = *b;
                *b = c ^ *prev;
                *prev = c;
            }
        }
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let range = self.offset as usize..(self.offset + self.size) as usize;
        for row in rows.chunks_exact_mut(row_size) {
            for (b, prev) in row[range.clone()].iter_mut().zip(self.prev.iter_mut()) {
                *prev ^= *b;
                *b = *prev;
            }
        }
    }
}

/// XOR a 32-bit effective address with the previous one.
///
/// Addresses at or above `0xFF00_0000` only keep their top byte, so the
/// common "no address" value `0xFFFF_FFFF` costs at most one residual byte
/// and leaves the prediction for the next real address intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveAddress {
    offset: u32,
    #[serde(skip)]
    prev: u32,
}

impl EffectiveAddress {
    /// Create a predictor for the address at `offset`.
    pub fn new(offset: u32) -> Self {
        Self { offset, prev: 0 }
    }
}

impl RowPredictor for EffectiveAddress {
    const NAME: &'static str = "effective_address";

    fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        mask.mark_read_write(self.offset, 4)
    }

    fn reset(&mut self) {
        self.prev = 0;
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let at = self.offset as usize;
        let mut prev = self.prev;
        for row in rows.chunks_exact_mut(row_size) {
            let v = LittleEndian::read_u32(&row[at..]);
            let mut delta = v ^ prev;
            if v >= 0xFF00_0000 {
                delta &= 0xFF00_0000;
            }
            prev ^= delta;
            LittleEndian::write_u32(&mut row[at..], delta);
        }
        self.prev = prev;
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let at = self.offset as usize;
        let mut prev = self.prev;
        for row in rows.chunks_exact_mut(row_size) {
            prev ^= LittleEndian::read_u32(&row[at..]);
            let v = if prev >= 0xFF00_0000 { u32::MAX } else { prev };
            LittleEndian::write_u32(&mut row[at..], v);
        }
        self.prev = prev;
    }
}

/// Fold a two's-complement 16-bit value so small magnitudes of either sign
/// have few set bits.
pub(crate) fn fold16(v: u16) -> u16 {
    let v = if v & 0x8000 != 0 { v ^ 0x7FFF } else { v };
    v.rotate_left(1)
}

pub(crate) fn unfold16(v: u16) -> u16 {
    let v = v.rotate_right(1);
    if v & 0x8000 != 0 { v ^ 0x7FFF } else { v }
}

/// Predict the next PC from the step last taken out of the previous PC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pc {
    offset: u32,
    #[serde(skip)]
    table: LookupTable<u16, 65536>,
    #[serde(skip)]
    prev_pc: u16,
}

impl Pc {
    /// Create a predictor for the PC at `offset`.
    pub fn new(offset: u32) -> Self {
        Self {
            offset,
            table: LookupTable::default(),
            prev_pc: 0,
        }
    }
}

impl RowPredictor for Pc {
    const NAME: &'static str = "pc";

    fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        mask.mark_read_write(self.offset, 2)
    }

    fn reset(&mut self) {
        self.table.clear();
        self.prev_pc = 0;
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let at = self.offset as usize;
        let mut prev_pc = self.prev_pc;
        for row in rows.chunks_exact_mut(row_size) {
            let pc = LittleEndian::read_u16(&row[at..]);
            let step = pc.wrapping_sub(prev_pc.wrapping_add(1));
            let pred = &mut self.table[prev_pc as usize];
            let residual = step.wrapping_sub(*pred);
            *pred = step;

            LittleEndian::write_u16(&mut row[at..], fold16(residual));
            prev_pc = pc;
        }
        self.prev_pc = prev_pc;
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let at = self.offset as usize;
        let mut pc = self.prev_pc;
        for row in rows.chunks_exact_mut(row_size) {
            let residual = unfold16(LittleEndian::read_u16(&row[at..]));
            let pred = &mut self.table[pc as usize];
            let step = pred.wrapping_add(residual);
            *pred = step;

            pc = pc.wrapping_add(step).wrapping_add(1);
            LittleEndian::write_u16(&mut row[at..], pc);
        }
        self.prev_pc = pc;
    }
}

/// Predict instruction bytes from the bytes last seen at the same address.
///
/// A zero byte that the table cannot predict is marked in a per-row flag
/// field instead of being stored. The flag bits live in
/// `flags_bit_offset..flags_bit_offset + insn_size` of the row and must be
/// zero in the input; decoding clears them again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insn {
    insn_offset: u32,
    insn_size: u32,
    pc_offset: u32,
    flags_bit_offset: u32,
    #[serde(skip)]
    table: LookupTable<u8, 65536>,
    #[serde(skip)]
    prev_flags: u8,
}

impl Insn {
    /// Create a predictor for `insn_size` bytes at `insn_offset`, keyed by the
    /// PC at `pc_offset`, with flags at bit `flags_bit_offset` of the row.
    pub fn new(insn_offset: u32, insn_size: u32, pc_offset: u32, flags_bit_offset: u32) -> Self {
        Self {
            insn_offset,
            insn_size,
            pc_offset,
            flags_bit_offset,
            table: LookupTable::default(),
            prev_flags: 0,
        }
    }

    fn flags_byte(&self) -> usize {
        (self.flags_bit_offset >> 3) as usize
    }

    fn flags_shift(&self) -> u32 {
        self.flags_bit_offset & 7
    }

    fn flags_mask(&self) -> u8 {
        ((1u16 << self.insn_size) - 1) as u8
    }
}

impl RowPredictor for Insn {
    const NAME: &'static str = "insn";

    fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        if self.insn_size == 0 || self.insn_size > MAX_INSN_SIZE {
            return Err(TraceError::predictor(
                Self::NAME,
                format!("instruction size {} outside 1..={}", self.insn_size, MAX_INSN_SIZE),
            ));
        }
        if self.flags_shift() + self.insn_size > 8 {
            return Err(TraceError::predictor(
                Self::NAME,
                "flag bits straddle a byte boundary",
            ));
        }

        let flags_byte = self.flags_bit_offset >> 3;
        mask.mark_read(self.pc_offset, 2)?;
        mask.mark_read_write(self.insn_offset, self.insn_size)?;
        mask.mark_read_write(flags_byte, 1)?;

        if !disjoint(flags_byte, 1, self.pc_offset, 2) {
            return Err(TraceError::predictor(Self::NAME, "flags overlap the PC"));
        }
        if !disjoint(flags_byte, 1, self.insn_offset, self.insn_size) {
            return Err(TraceError::predictor(
                Self::NAME,
                "flags overlap the instruction bytes",
            ));
        }
        if !disjoint(self.pc_offset, 2, self.insn_offset, self.insn_size) {
            return Err(TraceError::predictor(
                Self::NAME,
                "PC overlaps the instruction bytes",
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.table.clear();
        self.prev_flags = 0;
    }

    fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        let pc_at = self.pc_offset as usize;
        let insn_at = self.insn_offset as usize;
        let flags_at = self.flags_byte();
        let shift = self.flags_shift();

        for row in rows.chunks_exact_mut(row_size) {
            let pc = LittleEndian::read_u16(&row[pc_at..]) as usize;
            let mut flags = 0u8;

            for i in 0..self.insn_size as usize {
                let pred = &mut self.table[(pc + i) & 0xFFFF];
                let c = row[insn_at + i];
                let delta = c ^ *pred;

                if delta != 0 {
                    if c == 0 {
                        flags |= 1 << i;
                    } else {
                        *pred = c;
                        row[insn_at + i] = delta;
                    }
                } else {
                    if c == 0 && self.prev_flags & (1 << i) != 0 {
                        flags |= 1 << i;
                    }
                    row[insn_at + i] = 0;
                }
            }

            self.prev_flags = flags;
            row[flags_at] |= flags << shift;
        }
    }

    fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        let pc_at = self.pc_offset as usize;
        let insn_at = self.insn_offset as usize;
        let flags_at = self.flags_byte();
        let shift = self.flags_shift();
        let mask = self.flags_mask();

        for row in rows.chunks_exact_mut(row_size) {
            let pc = LittleEndian::read_u16(&row[pc_at..]) as usize;
            let flags = (row[flags_at] >> shift) & mask;

            for i in 0..self.insn_size as usize {
                if flags & (1 << i) == 0 {
                    let pred = &mut self.table[(pc + i) & 0xFFFF];
                    let c = row[insn_at + i] ^ *pred;
                    *pred = c;
                    row[insn_at + i] = c;
                }
            }

            row[flags_at] &= !(mask << shift);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Predictor;
    use super::super::test_support::{assert_round_trip, noisy_rows};
    use super::*;

    #[test]
    fn xor_residual_is_change_from_previous_row() {
        let mut p = Xor::new(1, 2);
        let mut rows = vec![9, 0x10, 0x20, 9, 0x11, 0x20];
        p.encode(&mut rows, 3);
        assert_eq!(rows, vec![9, 0x10, 0x20, 9, 0x01, 0x00]);
    }

    #[test]
    fn xor_round_trips() {
        let rows = noisy_rows(16, 500, 1);
        assert_round_trip(Xor::new(3, 13).into(), &rows, 16);
    }

    #[test]
    fn xor_rejects_bad_size() {
        let mut mask = AccessMask::new(64);
        assert!(Xor::new(0, 0).validate(&mut mask).is_err());
        assert!(Xor::new(0, 33).validate(&mut mask).is_err());
        assert!(Xor::new(20, 8).validate(&mut AccessMask::new(24)).is_err());
    }

    fn ea_rows(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn ea_sentinel_survives_intervening_addresses() {
        let values = [
            u32::MAX,
            0x0000_D40A,
            0x0000_D40B,
            0x00FF_1234,
            u32::MAX,
            0x0000_0080,
            0x0001_0000,
            u32::MAX,
            u32::MAX,
            0x0000_0081,
        ];
        let rows = ea_rows(&values);
        assert_round_trip(EffectiveAddress::new(0).into(), &rows, 4);
    }

    #[test]
    fn ea_sentinel_costs_one_residual_byte() {
        let mut p = EffectiveAddress::new(0);
        let mut rows = ea_rows(&[0x1234, u32::MAX, 0x1234]);
        p.encode(&mut rows, 4);
        assert_eq!(&rows[4..8], &[0, 0, 0, 0xFF]);
        assert_eq!(&rows[8..12], &[0, 0, 0, 0xFF]);
    }

    #[test]
    fn ea_reserved_range_reads_back_as_sentinel() {
        let mut p = EffectiveAddress::new(0);
        let mut rows = ea_rows(&[0xFF00_1234]);
        p.encode(&mut rows, 4);
        p.reset();
        p.decode(&mut rows, 4);
        assert_eq!(rows, ea_rows(&[u32::MAX]));
    }

    #[test]
    fn fold_keeps_small_magnitudes_small() {
        assert_eq!(fold16(0), 0);
        assert_eq!(fold16(1), 2);
        assert_eq!(fold16(0xFFFF), 1);
        assert_eq!(fold16(0xFFFE), 3);
        for v in [0u16, 1, 2, 0x7FFF, 0x8000, 0xFFFF, 0x1234, 0xBEEF] {
            assert_eq!(unfold16(fold16(v)), v);
        }
    }

    fn pc_rows(pcs: &[u16]) -> Vec<u8> {
        pcs.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn pc_loop_becomes_zero_residuals() {
        // A three-instruction loop: after the first pass every step is known.
        let trace: Vec<u16> = (0..5)
            .flat_map(|_| [0x2000u16, 0x2002, 0x2005])
            .collect();
        let mut rows = pc_rows(&trace);
        let mut p = Pc::new(0);
        p.encode(&mut rows, 2);

        // The first four rows teach the table; the rest are fully predicted.
        let tail = &rows[4 * 2..];
        assert!(tail.iter().all(|&b| b == 0), "residuals: {:?}", tail);
    }

    #[test]
    fn pc_round_trips_including_wrap() {
        let trace = [0xFFFE, 0xFFFF, 0x0000, 0x0100, 0xE000, 0xFFFD, 0x0002];
        assert_round_trip(Pc::new(0).into(), &pc_rows(&trace), 2);
    }

    fn insn_row(pc: u16, bytes: [u8; 4]) -> Vec<u8> {
        // [pc:2][insn:4][flags:1][pad:1]
        let mut row = vec![0u8; 8];
        row[0..2].copy_from_slice(&pc.to_le_bytes());
        row[2..6].copy_from_slice(&bytes);
        row
    }

    fn insn_predictor() -> Insn {
        Insn::new(2, 4, 0, 6 * 8 + 4)
    }

    #[test]
    fn insn_repeated_instructions_vanish() {
        let mut rows = Vec::new();
        for _ in 0..3 {
            rows.extend(insn_row(0x0600, [0xA9, 0x10, 0, 0]));
            rows.extend(insn_row(0x0602, [0x8D, 0x00, 0xD4, 0]));
        }
        let mut p = insn_predictor();
        p.encode(&mut rows, 8);
        for row in rows.chunks(8).skip(2) {
            assert_eq!(&row[2..6], &[0, 0, 0, 0]);
        }
    }

    #[test]
    fn insn_round_trips_with_self_modifying_code() {
        let mut rows = Vec::new();
        rows.extend(insn_row(0x0600, [0xA9, 0x10, 0x00, 0x00]));
        rows.extend(insn_row(0x0600, [0xA9, 0x00, 0x00, 0x00]));
        rows.extend(insn_row(0x0600, [0xA9, 0x00, 0x7F, 0x00]));
        rows.extend(insn_row(0x0600, [0x00, 0x00, 0x7F, 0x00]));
        rows.extend(insn_row(0xFFFE, [0x4C, 0x00, 0x06, 0x00]));
        rows.extend(insn_row(0xFFFE, [0x4C, 0x00, 0x00, 0x00]));
        rows.extend(insn_row(0x0001, [0x12, 0x00, 0x00, 0x00]));
        assert_round_trip(insn_predictor().into(), &rows, 8);
    }

    #[test]
    fn insn_round_trips_noise() {
        let mut rows = noisy_rows(8, 2000, 7);
        for row in rows.chunks_mut(8) {
            row[6] &= 0x0F;
        }
        assert_round_trip(insn_predictor().into(), &rows, 8);
    }

    #[test]
    fn insn_rejects_overlaps() {
        let mut mask = AccessMask::new(8);
        // Flags inside the PC.
        assert!(Insn::new(2, 4, 0, 8).validate(&mut mask).is_err());
        // Flags inside the instruction.
        assert!(Insn::new(2, 4, 0, 3 * 8).validate(&mut AccessMask::new(8)).is_err());
        // PC overlaps the instruction.
        assert!(Insn::new(2, 4, 1, 6 * 8).validate(&mut AccessMask::new(8)).is_err());
        // Flag bits cross into the next byte.
        assert!(Insn::new(2, 4, 0, 6 * 8 + 5).validate(&mut AccessMask::new(8)).is_err());
        // Too long.
        assert!(Insn::new(2, 9, 0, 6 * 8).validate(&mut AccessMask::new(16)).is_err());
        assert!(
            Predictor::from(insn_predictor())
                .access_mask(8)
                .is_ok()
        );
    }
}
