//! Inspect command - show a trace file's manifest and block layout.

use anyhow::{Context, Result};
use cputrace_core::trace_io::{TraceInfo, read_trace_info};
use std::path::Path;

use super::{format_bytes, open_trace};

/// Run the inspect command.
pub fn run(path: &Path, blocks: bool) -> Result<()> {
    tracing::info!(path = %path.display(), "Inspecting trace");
    let info = read_trace_info(open_trace(path)?)
        .with_context(|| format!("Failed to read trace: {}", path.display()))?;
    print!("{}", render(&info, blocks));
    Ok(())
}

fn render(info: &TraceInfo, blocks: bool) -> String {
    let manifest = &info.manifest;
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    line("Trace Information".to_string());
    line("=================".to_string());
    line(format!("Format version: {}", info.header.version));
    line(format!("Channel:        {}", manifest.channel));
    line(format!("Rows:           {}", manifest.row_count));
    line(format!("Row size:       {} bytes", manifest.byte_count));
    line(format!("Row group size: {}", manifest.row_group_size));
    line(format!("Codec:          {}", manifest.codec.name()));
    line(format!("Tick scale:     {:e} s", manifest.tick_scale));
    line(String::new());

    line("Columns".to_string());
    line("=======".to_string());
    for column in &manifest.columns {
        line(format!(
            "  {:<18} bits {:>3}..{:<3} ({} bits)",
            column.kind.name(),
            column.bit_offset,
            column.bit_offset + column.bit_width,
            column.bit_width
        ));
    }
    line(String::new());

    line("Predictors (decode order)".to_string());
    line("=========================".to_string());
    for (i, predictor) in manifest.predictors.iter().enumerate() {
        line(format!("  {:>2}. {}", i + 1, predictor.name()));
    }
    line(String::new());

    line("Storage".to_string());
    line("=======".to_string());
    line(format!("  Blocks:            {}", info.block_sizes.len()));
    line(format!("  Packed bytes:      {}", format_bytes(info.packed_bytes())));
    let raw = u64::from(manifest.row_count) * u64::from(manifest.byte_count);
    line(format!("  Unpacked bytes:    {}", format_bytes(raw)));
    line(format!("  Compression ratio: {:.2}x", info.compression_ratio()));
    if manifest.row_count > 0 {
        line(format!(
            "  Bytes per row:     {:.3}",
            info.packed_bytes() as f64 / f64::from(manifest.row_count)
        ));
    }

    if blocks {
        line(String::new());
        line("Blocks".to_string());
        line("======".to_string());
        for (i, size) in info.block_sizes.iter().enumerate() {
            let first = i as u64 * u64::from(manifest.row_group_size);
            line(format!(
                "  #{:<5} rows from {:<10} {}",
                i,
                first,
                format_bytes(u64::from(*size))
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cputrace_core::testing::SyntheticCpu;
    use cputrace_core::trace_io::{SaveOptions, save_cpu_history};
    use cputrace_core::{CpuHistoryChannel, HistoryConfig};

    fn sample_info() -> TraceInfo {
        let mut channel = CpuHistoryChannel::new(HistoryConfig::new("CPU")).unwrap();
        channel.begin_events();
        for (tick, he) in SyntheticCpu::new(3).take(700) {
            channel.add_event(tick, &he);
        }
        channel.end_events().unwrap();
        let mut bytes = Vec::new();
        save_cpu_history(
            &mut channel,
            &mut bytes,
            &SaveOptions::default().with_row_group_size(256),
        )
        .unwrap();
        read_trace_info(bytes.as_slice()).unwrap()
    }

    #[test]
    fn summary_lists_layout() {
        let text = render(&sample_info(), false);
        assert!(text.contains("Rows:           700"));
        assert!(text.contains("Codec:          sparse"));
        assert!(text.contains("effective_address"));
        assert!(text.contains("xor32_table8"));
        assert!(!text.contains("rows from"));
    }

    #[test]
    fn block_listing() {
        let text = render(&sample_info(), true);
        assert_eq!(text.matches("rows from").count(), 3);
        assert!(text.contains("rows from 512"));
    }
}
