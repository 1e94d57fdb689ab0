//! A seeded 6502-like instruction stream.

use crate::types::{EA_NONE, HistoryEntry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// First address of the generated program.
pub const PROGRAM_BASE: u16 = 0x8000;

/// Size of the generated program in bytes.
pub const PROGRAM_LEN: u16 = 0x1000;

const MEMORY_SIZE: usize = 0x1_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Implied,
    Immediate,
    ZeroPage,
    Absolute,
    IndirectY,
    Relative,
    Jump,
}

impl Mode {
    fn len(self) -> u16 {
        match self {
            Mode::Implied => 1,
            Mode::Immediate | Mode::ZeroPage | Mode::IndirectY | Mode::Relative => 2,
            Mode::Absolute | Mode::Jump => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    None,
    LoadA,
    IncX,
    IncY,
    Compare,
}

#[derive(Debug, Clone, Copy)]
struct Op {
    code: u8,
    mode: Mode,
    cycles: u32,
    effect: Effect,
}

const fn op(code: u8, mode: Mode, cycles: u32, effect: Effect) -> Op {
    Op {
        code,
        mode,
        cycles,
        effect,
    }
}

const OPS: &[Op] = &[
    op(0xEA, Mode::Implied, 2, Effect::None),
    op(0xA9, Mode::Immediate, 2, Effect::LoadA),
    op(0xA5, Mode::ZeroPage, 3, Effect::LoadA),
    op(0xAD, Mode::Absolute, 4, Effect::LoadA),
    op(0xB1, Mode::IndirectY, 5, Effect::LoadA),
    op(0x85, Mode::ZeroPage, 3, Effect::None),
    op(0x8D, Mode::Absolute, 4, Effect::None),
    op(0xE8, Mode::Implied, 2, Effect::IncX),
    op(0xC8, Mode::Implied, 2, Effect::IncY),
    op(0xC9, Mode::Immediate, 2, Effect::Compare),
    op(0xD0, Mode::Relative, 2, Effect::None),
    op(0x4C, Mode::Jump, 3, Effect::None),
];

fn lookup(code: u8) -> Op {
    OPS.iter()
        .copied()
        .find(|op| op.code == code)
        .unwrap_or(OPS[0])
}

/// Executes a generated program, producing one history entry per instruction.
///
/// Branches are taken at random, loads produce random values, and the CPU is
/// occasionally stalled so that `cycle` runs ahead of `unhalted_cycle`.
#[derive(Clone)]
pub struct SyntheticCpu {
    rng: StdRng,
    memory: Box<[u8]>,
    cycle: u64,
    unhalted_cycle: u32,
    pc: u16,
    a: u8,
    x: u8,
    y: u8,
    s: u8,
    p: u8,
    irq: bool,
}

impl SyntheticCpu {
    /// Generate a program from `seed` and position the CPU at its start.
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let memory = generate_program(&mut rng);
        Self {
            rng,
            memory,
            cycle: 0,
            unhalted_cycle: 0,
            pc: PROGRAM_BASE,
            a: 0,
            x: 0,
            y: 0,
            s: 0xFF,
            p: 0x34,
            irq: false,
        }
    }

    /// Start the clock at `tick` instead of zero.
    pub fn with_start_tick(mut self, tick: u64) -> Self {
        self.cycle = tick;
        self.unhalted_cycle = tick as u32;
        self
    }

    /// Execute one instruction and return its tick and history entry.
    pub fn step(&mut self) -> (u64, HistoryEntry) {
        let pc = usize::from(self.pc);
        let mut opcode = [0u8; 4];
        opcode.copy_from_slice(&self.memory[pc..pc + 4]);
        let op = lookup(opcode[0]);
        let operand = u16::from_le_bytes([opcode[1], opcode[2]]);

        let ea = match op.mode {
            Mode::ZeroPage => u32::from(opcode[1]),
            Mode::Absolute => u32::from(operand),
            Mode::IndirectY => 0x0400 + u32::from(self.y),
            _ => EA_NONE,
        };

        let tick = self.cycle;
        let he = HistoryEntry {
            cycle: self.cycle as u32,
            unhalted_cycle: self.unhalted_cycle,
            ea,
            a: self.a,
            x: self.x,
            y: self.y,
            s: self.s,
            pc: self.pc,
            p: self.p,
            irq: self.irq,
            nmi: false,
            opcode,
            global_pc_base: 0,
        };

        match op.effect {
            Effect::LoadA => {
                self.a = self.rng.r#gen();
                self.set_nz(self.a);
            }
            Effect::IncX => {
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
            }
            Effect::IncY => {
                self.y = self.y.wrapping_add(1);
                self.set_nz(self.y);
            }
            Effect::Compare => {
                self.p = (self.p & !0x01) | u8::from(self.a >= opcode[1]);
            }
            Effect::None => {}
        }

        let mut cycles = op.cycles;
        let next = match op.mode {
            Mode::Relative if self.rng.gen_bool(0.6) => {
                cycles += 1;
                self.pc
                    .wrapping_add(2)
                    .wrapping_add(i16::from(opcode[1] as i8) as u16)
            }
            Mode::Jump => operand,
            mode => self.pc.wrapping_add(mode.len()),
        };
        self.pc = if (PROGRAM_BASE..PROGRAM_BASE + PROGRAM_LEN - 3).contains(&next) {
            next
        } else {
            PROGRAM_BASE
        };

        let stall = if self.rng.gen_bool(0.05) {
            self.rng.gen_range(1..=8)
        } else {
            0
        };
        self.cycle += u64::from(cycles + stall);
        self.unhalted_cycle = self.unhalted_cycle.wrapping_add(cycles);
        self.irq = self.rng.gen_ratio(1, 4096);

        (tick, he)
    }

    fn set_nz(&mut self, value: u8) {
        self.p = (self.p & !0x82) | (value & 0x80) | (u8::from(value == 0) << 1);
    }
}

impl Iterator for SyntheticCpu {
    type Item = (u64, HistoryEntry);

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.step())
    }
}

fn generate_program(rng: &mut StdRng) -> Box<[u8]> {
    let mut memory = vec![0u8; MEMORY_SIZE].into_boxed_slice();
    let end = PROGRAM_BASE + PROGRAM_LEN - 3;
    let mut starts = Vec::new();
    let mut addr = PROGRAM_BASE;

    while addr + 3 < end {
        let op = OPS[rng.gen_range(0..OPS.len())];
        let at = usize::from(addr);
        memory[at] = op.code;
        match op.mode {
            Mode::Immediate => memory[at + 1] = rng.r#gen(),
            Mode::ZeroPage | Mode::IndirectY => memory[at + 1] = rng.gen_range(0x80..=0xFF),
            Mode::Absolute => {
                let target: u16 = rng.gen_range(0x0200..0x0800);
                memory[at + 1..at + 3].copy_from_slice(&target.to_le_bytes());
            }
            _ => {}
        }
        starts.push(addr);
        addr += op.mode.len();
    }

    // Wrap back to the start.
    let at = usize::from(addr);
    memory[at] = 0x4C;
    memory[at + 1..at + 3].copy_from_slice(&PROGRAM_BASE.to_le_bytes());

    // Point branches and jumps at instruction boundaries.
    for (i, &start) in starts.iter().enumerate() {
        let at = usize::from(start);
        match lookup(memory[at]).mode {
            Mode::Relative => {
                let lo = i.saturating_sub(8);
                let hi = (i + 8).min(starts.len() - 1);
                let target = starts[rng.gen_range(lo..=hi)];
                let offset = i32::from(target) - i32::from(start) - 2;
                memory[at + 1] = i8::try_from(offset).unwrap_or(0) as u8;
            }
            Mode::Jump => {
                let target = starts[rng.gen_range(0..starts.len())];
                memory[at + 1..at + 3].copy_from_slice(&target.to_le_bytes());
            }
            _ => {}
        }
    }

    memory
}
