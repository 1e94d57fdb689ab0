//! Synthesize command - record a synthetic CPU run and save it as a trace.

use anyhow::{Context, Result};
use cputrace_core::testing::SyntheticCpu;
use cputrace_core::trace_io::{SaveOptions, save_cpu_history};
use cputrace_core::{Codec, CpuHistoryChannel, HistoryConfig};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use super::format_bytes;

/// What to synthesize and how to store it.
#[derive(Debug, Clone)]
pub struct SynthesizeOptions {
    /// Instructions to record.
    pub rows: u32,
    /// Rows per trace block.
    pub group_size: u32,
    /// Generator seed; random when absent.
    pub seed: Option<u64>,
    /// Block codec.
    pub codec: Codec,
}

/// Run the synthesize command.
pub fn run(out: &Path, options: &SynthesizeOptions) -> Result<()> {
    let seed = options.seed.unwrap_or_else(rand::random);
    tracing::info!(rows = options.rows, seed, out = %out.display(), "Synthesizing trace");

    let started = Instant::now();
    let mut channel = CpuHistoryChannel::new(HistoryConfig::new("CPU"))?;
    channel.begin_events();
    for (tick, he) in SyntheticCpu::new(seed).take(options.rows as usize) {
        channel.add_event(tick, &he);
    }
    channel.end_events()?;
    let captured = started.elapsed();

    let file = File::create(out)
        .with_context(|| format!("Failed to create trace: {}", out.display()))?;
    let mut writer = BufWriter::new(file);
    let save_options = SaveOptions::default()
        .with_row_group_size(options.group_size)
        .with_codec(options.codec);
    let summary = save_cpu_history(&mut channel, &mut writer, &save_options)
        .with_context(|| format!("Failed to save trace: {}", out.display()))?;

    let stats = channel.arena_stats();
    println!("✓ Wrote {}", out.display());
    println!("  Seed:          {}", seed);
    println!("  Rows:          {}", summary.rows);
    println!("  Blocks:        {}", summary.blocks);
    println!("  File size:     {}", format_bytes(summary.bytes_written));
    println!("  Live packed:   {}", format_bytes(stats.bytes_used));
    println!("  Capture time:  {:.2?}", captured);
    println!("  Duration:      {:.6} s", channel.duration());
    Ok(())
}
