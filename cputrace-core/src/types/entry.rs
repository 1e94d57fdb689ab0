//! The capture-side row: one retired instruction.

/// Effective address value meaning "this instruction accessed no memory".
pub const EA_NONE: u32 = 0xFFFF_FFFF;

/// Effective addresses at or above this value are reserved.
///
/// The packed encodings only keep the top byte of a reserved address, so any
/// value in `EA_RESERVED_FLOOR..EA_NONE` reads back as [`EA_NONE`].
pub const EA_RESERVED_FLOOR: u32 = 0xFF00_0000;

/// One row of CPU history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryEntry {
    /// Machine cycle at which the instruction started.
    pub cycle: u32,
    /// Cycle counter that only advances while the CPU is not halted.
    pub unhalted_cycle: u32,
    /// Effective address, or [`EA_NONE`].
    pub ea: u32,
    /// Accumulator.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Stack pointer.
    pub s: u8,
    /// Program counter.
    pub pc: u16,
    /// Processor status register.
    pub p: u8,
    /// An IRQ was taken before this instruction.
    pub irq: bool,
    /// An NMI was taken before this instruction.
    pub nmi: bool,
    /// Instruction bytes (opcode first).
    pub opcode: [u8; 4],
    /// Bank/base added to `pc` to form a global address.
    pub global_pc_base: u32,
}

impl Default for HistoryEntry {
    fn default() -> Self {
        Self {
            cycle: 0,
            unhalted_cycle: 0,
            ea: EA_NONE,
            a: 0,
            x: 0,
            y: 0,
            s: 0,
            pc: 0,
            p: 0,
            irq: false,
            nmi: false,
            opcode: [0; 4],
            global_pc_base: 0,
        }
    }
}

impl HistoryEntry {
    /// Check whether the instruction accessed memory.
    #[must_use]
    pub fn has_ea(&self) -> bool {
        self.ea < EA_RESERVED_FLOOR
    }

    /// Global address of the instruction.
    #[must_use]
    pub fn global_pc(&self) -> u32 {
        self.global_pc_base.wrapping_add(u32::from(self.pc))
    }

    /// Collapse reserved effective addresses onto [`EA_NONE`].
    ///
    /// This is the form every packed representation reads back.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.ea >= EA_RESERVED_FLOOR {
            self.ea = EA_NONE;
        }
        self
    }
}
