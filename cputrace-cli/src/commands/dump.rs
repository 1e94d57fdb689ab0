//! Dump command - print decoded rows of a trace.

use anyhow::{Context, Result};
use cputrace_core::trace_io::{LoadOptions, load_cpu_history};
use cputrace_core::types::HistoryEntry;
use std::fmt::Write as _;
use std::path::Path;

use super::open_trace;

const BATCH: usize = 256;

/// Run the dump command.
pub fn run(path: &Path, start: u32, count: u32) -> Result<()> {
    tracing::info!(path = %path.display(), start, count, "Dumping trace");
    let mut channel = load_cpu_history(open_trace(path)?, &LoadOptions::default())
        .with_context(|| format!("Failed to load trace: {}", path.display()))?;

    let total = channel.event_count();
    if start >= total {
        println!("Trace has {} rows; nothing at {}", total, start);
        return Ok(());
    }
    let end = start.saturating_add(count).min(total);

    println!("{}", header());
    channel.start_history_iteration(0.0, 0)?;
    let mut rows = [HistoryEntry::default(); BATCH];
    let mut index = start;
    while index < end {
        let want = ((end - index) as usize).min(BATCH);
        let got = channel.read_history_events(&mut rows[..want], index)?;
        for (i, he) in rows[..got].iter().enumerate() {
            let row = index + i as u32;
            println!("{}", format_row(row, channel.event_time(row)?, he));
        }
        if got == 0 {
            break;
        }
        index += got as u32;
    }
    Ok(())
}

fn header() -> String {
    format!(
        "{:>8}  {:>14}  {:>10}  {:>10}  {:<4}  {:<11}  A  X  Y  S  P   {:<8}  FLAGS",
        "ROW", "TIME (s)", "CYCLE", "UNHALTED", "PC", "OPCODE", "EA"
    )
}

fn format_row(index: u32, time: f64, he: &HistoryEntry) -> String {
    let mut line = format!(
        "{:>8}  {:>14.9}  {:>10}  {:>10}  {:04X}  {:02X} {:02X} {:02X} {:02X}  {:02X} {:02X} {:02X} {:02X} {:02X}  ",
        index,
        time,
        he.cycle,
        he.unhalted_cycle,
        he.pc,
        he.opcode[0],
        he.opcode[1],
        he.opcode[2],
        he.opcode[3],
        he.a,
        he.x,
        he.y,
        he.s,
        he.p,
    );
    if he.has_ea() {
        let _ = write!(line, "{:08X}", he.ea);
    } else {
        line.push_str("--------");
    }
    line.push_str("  ");
    line.push_str(match (he.irq, he.nmi) {
        (true, true) => "IRQ NMI",
        (true, false) => "IRQ",
        (false, true) => "NMI",
        (false, false) => "",
    });
    if he.global_pc_base != 0 {
        let _ = write!(line, " @{:08X}", he.global_pc());
    }
    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cputrace_core::EA_NONE;

    #[test]
    fn row_formatting() {
        let he = HistoryEntry {
            cycle: 100,
            unhalted_cycle: 90,
            ea: 0x0200,
            a: 0x12,
            x: 1,
            y: 2,
            s: 0xFD,
            pc: 0x8004,
            p: 0x34,
            irq: true,
            nmi: false,
            opcode: [0xAD, 0x00, 0x02, 0x00],
            global_pc_base: 0,
        };
        let line = format_row(7, 0.5, &he);
        assert!(line.starts_with("       7"));
        assert!(line.contains("8004  AD 00 02 00  12 01 02 FD 34  00000200  IRQ"));

        let he = HistoryEntry {
            ea: EA_NONE,
            irq: false,
            global_pc_base: 0x1_0000,
            ..he
        };
        let line = format_row(8, 0.5, &he);
        assert!(line.contains("--------"));
        assert!(line.ends_with("@00018004"));
    }

    #[test]
    fn header_matches_columns() {
        assert!(header().starts_with("     ROW"));
        assert!(header().ends_with("FLAGS"));
    }
}
