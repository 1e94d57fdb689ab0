//! The 32-byte live row layout.
//!
//! ```text
//! 0..4    cycle            16..20  ea
//! 4..8    unhalted_cycle   20..24  opcode bytes
//! 8..12   a, x, y, s       24..28  global_pc_base
//! 12..14  pc               28..32  zero
//! 14      p
//! 15      irq | nmi << 1
//! ```

use crate::types::HistoryEntry;
use byteorder::{ByteOrder, LittleEndian};

/// Pack `he` into `out[..32]`.
pub fn write_live_row(he: &HistoryEntry, out: &mut [u8]) {
    LittleEndian::write_u32(&mut out[0..], he.cycle);
    LittleEndian::write_u32(&mut out[4..], he.unhalted_cycle);
    out[8] = he.a;
    out[9] = he.x;
    out[10] = he.y;
    out[11] = he.s;
    LittleEndian::write_u16(&mut out[12..], he.pc);
    out[14] = he.p;
    out[15] = u8::from(he.irq) | (u8::from(he.nmi) << 1);
    LittleEndian::write_u32(&mut out[16..], he.ea);
    out[20..24].copy_from_slice(&he.opcode);
    LittleEndian::write_u32(&mut out[24..], he.global_pc_base);
    out[28..32].fill(0);
}

/// Unpack a row written by [`write_live_row`].
#[must_use]
pub fn read_live_row(row: &[u8]) -> HistoryEntry {
    let mut opcode = [0u8; 4];
    opcode.copy_from_slice(&row[20..24]);
    HistoryEntry {
        cycle: LittleEndian::read_u32(&row[0..]),
        unhalted_cycle: LittleEndian::read_u32(&row[4..]),
        ea: LittleEndian::read_u32(&row[16..]),
        a: row[8],
        x: row[9],
        y: row[10],
        s: row[11],
        pc: LittleEndian::read_u16(&row[12..]),
        p: row[14],
        irq: row[15] & 1 != 0,
        nmi: row[15] & 2 != 0,
        opcode,
        global_pc_base: LittleEndian::read_u32(&row[24..]),
    }
}
