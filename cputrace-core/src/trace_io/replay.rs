//! Rebuilding history entries from schema-described rows.

use crate::format::{ColumnKind, RowSchema};
use crate::history::{read_live_row, write_live_row};
use crate::types::{EA_NONE, HistoryEntry};

/// Byte offsets of entry fields in the live row layout.
mod live {
    pub const CYCLE: usize = 0;
    pub const UNHALTED_CYCLE: usize = 4;
    pub const A: usize = 8;
    pub const X: usize = 9;
    pub const Y: usize = 10;
    pub const S: usize = 11;
    pub const PC: usize = 12;
    pub const P: usize = 14;
    pub const EA: usize = 16;
    pub const OPCODE: usize = 20;
    pub const GLOBAL_PC_BASE: usize = 24;
    pub const SIZE: usize = 32;
}

/// Carry state for a cycle counter stored narrower than 32 bits.
#[derive(Debug, Clone, Copy, Default)]
struct Widener {
    /// Added to the base each time the narrow value goes backwards.
    step: u32,
    last: u32,
    base: u32,
}

impl Widener {
    fn new(bit_width: u32) -> Self {
        let step = match bit_width {
            0..=15 => 0x100,
            16..=23 => 0x1_0000,
            24..=31 => 0x100_0000,
            _ => 0,
        };
        Self {
            step,
            ..Self::default()
        }
    }

    fn widen(&mut self, narrow: u32) -> u32 {
        if narrow < self.last {
            self.base = self.base.wrapping_add(self.step);
        }
        self.last = narrow;
        narrow.wrapping_add(self.base)
    }
}

/// A single-bit flag column.
#[derive(Debug, Clone, Copy)]
struct FlagBit {
    byte: usize,
    mask: u8,
}

impl FlagBit {
    fn new(bit_offset: u32) -> Self {
        Self {
            byte: (bit_offset / 8) as usize,
            mask: 1 << (bit_offset % 8),
        }
    }

    fn read(self, row: &[u8]) -> bool {
        row[self.byte] & self.mask != 0
    }
}

/// Converts decoded rows of any valid schema into [`HistoryEntry`] values.
///
/// Columns the schema lacks read as zero, except the effective address
/// ([`EA_NONE`]) and the flags register (`0x30`). Narrow cycle columns are
/// widened by carrying whenever the stored value decreases; that state
/// persists across calls, so feed row groups in order.
#[derive(Debug, Clone)]
pub struct HistoryDecoder {
    row_size: usize,
    /// `(live row offset, source row offset)` byte copies.
    copies: Vec<(usize, usize)>,
    base_row: [u8; live::SIZE],
    irq: Option<FlagBit>,
    nmi: Option<FlagBit>,
    cycle: Widener,
    unhalted_cycle: Widener,
}

impl HistoryDecoder {
    /// Build a decoder for rows laid out by `schema`.
    pub fn new(schema: &RowSchema) -> Self {
        let mut copies = Vec::new();
        let mut irq = None;
        let mut nmi = None;
        let mut cycle = Widener::default();
        let mut unhalted_cycle = Widener::default();

        for column in schema.columns() {
            let src = column.byte_offset();
            let mut copy = |dst: usize, bytes: usize| {
                copies.extend((0..bytes).map(|i| (dst + i, src + i)));
            };
            let width = column.bit_width;
            match column.kind {
                ColumnKind::A => copy(live::A, 1),
                ColumnKind::X => copy(live::X, 1),
                ColumnKind::Y => copy(live::Y, 1),
                ColumnKind::S => copy(live::S, 1),
                ColumnKind::P => copy(live::P, 1),
                ColumnKind::Pc if width >= 16 => copy(live::PC, 2),
                ColumnKind::Opcode => copy(live::OPCODE, column.byte_width().min(4)),
                ColumnKind::Cycle => {
                    copy(live::CYCLE, column.byte_width().min(4));
                    cycle = Widener::new(width);
                }
                ColumnKind::UnhaltedCycle => {
                    copy(live::UNHALTED_CYCLE, column.byte_width().min(4));
                    unhalted_cycle = Widener::new(width);
                }
                ColumnKind::EffectiveAddress if width >= 32 => copy(live::EA, 4),
                ColumnKind::GlobalPcBase if width >= 32 => copy(live::GLOBAL_PC_BASE, 4),
                ColumnKind::Irq => irq = Some(FlagBit::new(column.bit_offset)),
                ColumnKind::Nmi => nmi = Some(FlagBit::new(column.bit_offset)),
                _ => {}
            }
        }

        let defaults = HistoryEntry {
            ea: EA_NONE,
            p: 0x30,
            ..HistoryEntry::default()
        };
        let mut base_row = [0u8; live::SIZE];
        write_live_row(&defaults, &mut base_row);
        for &(dst, _) in &copies {
            base_row[dst] = 0;
        }

        Self {
            row_size: schema.row_size() as usize,
            copies,
            base_row,
            irq,
            nmi,
            cycle,
            unhalted_cycle,
        }
    }

    /// Row width in bytes.
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Decode every whole row of `rows` into `out`.
    pub fn decode(&mut self, rows: &[u8], out: &mut Vec<HistoryEntry>) {
        out.reserve(rows.len() / self.row_size);
        for row in rows.chunks_exact(self.row_size) {
            let mut scratch = self.base_row;
            for &(dst, src) in &self.copies {
                scratch[dst] = row[src];
            }

            let mut he = read_live_row(&scratch);
            if let Some(bit) = self.irq {
                he.irq = bit.read(row);
            }
            if let Some(bit) = self.nmi {
                he.nmi = bit.read(row);
            }
            he.cycle = self.cycle.widen(he.cycle);
            he.unhalted_cycle = self.unhalted_cycle.widen(he.unhalted_cycle);
            out.push(he);
        }
    }
}
