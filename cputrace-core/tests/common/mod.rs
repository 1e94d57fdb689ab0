//! Common test utilities for integration tests.

#![allow(dead_code)]

use cputrace_core::arena::ArenaConfig;
use cputrace_core::testing::SyntheticCpu;
use cputrace_core::trace_io::{SaveOptions, save_cpu_history};
use cputrace_core::types::HistoryEntry;
use cputrace_core::{CpuHistoryChannel, HistoryConfig};

/// Rows in one packing chunk.
pub const CHUNK_ROWS: u32 = 256 * 64;

/// A channel config with one tick per second and a small arena.
pub fn test_history_config() -> HistoryConfig {
    HistoryConfig::new("CPU")
        .with_tick_scale(1.0)
        .with_arena(ArenaConfig::small())
}

/// `count` synthetic events from `seed`.
pub fn synthetic_events(count: usize, seed: u64) -> Vec<(u64, HistoryEntry)> {
    SyntheticCpu::new(seed).take(count).collect()
}

/// Events whose cycle and unhalted cycle both equal the row index.
pub fn counting_events(count: u32) -> Vec<(u64, HistoryEntry)> {
    (0..count)
        .map(|i| {
            let he = HistoryEntry {
                cycle: i,
                unhalted_cycle: i,
                pc: 0x2000 + (i % 64) as u16,
                opcode: [0xEA, 0, 0, 0],
                ..Default::default()
            };
            (u64::from(i), he)
        })
        .collect()
}

/// Feed `events` through a new channel and wait for packing.
pub fn capture(events: &[(u64, HistoryEntry)], config: HistoryConfig) -> CpuHistoryChannel {
    let mut channel = CpuHistoryChannel::new(config).unwrap();
    channel.begin_events();
    for (tick, he) in events {
        channel.add_event(*tick, he);
    }
    channel.end_events().unwrap();
    channel
}

/// Every row of `channel`, from the start.
pub fn read_all(channel: &mut CpuHistoryChannel) -> Vec<HistoryEntry> {
    channel.start_history_iteration(0.0, 0).unwrap();
    let mut out = vec![HistoryEntry::default(); channel.event_count() as usize];
    let n = channel.read_history_events(&mut out, 0).unwrap();
    assert_eq!(n, out.len());
    out
}

/// Save `channel` into memory.
pub fn save_to_vec(channel: &mut CpuHistoryChannel, options: &SaveOptions) -> Vec<u8> {
    let mut bytes = Vec::new();
    save_cpu_history(channel, &mut bytes, options).unwrap();
    bytes
}

/// What a save and reload of `events` reads back: cycle counters relative to
/// the channel base and the first row, reserved addresses collapsed.
pub fn expected_after_reload(events: &[(u64, HistoryEntry)], base_cycle: u32) -> Vec<HistoryEntry> {
    let base_unhalted = events.first().map_or(0, |(_, he)| he.unhalted_cycle);
    events
        .iter()
        .map(|(_, he)| {
            let mut he = he.normalized();
            he.cycle = he.cycle.wrapping_sub(base_cycle);
            he.unhalted_cycle = he.unhalted_cycle.wrapping_sub(base_unhalted);
            he
        })
        .collect()
}
