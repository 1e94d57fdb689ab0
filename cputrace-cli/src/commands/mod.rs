//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod synthesize;
pub mod verify;

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Open a trace file for buffered reading.
fn open_trace(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        anyhow::bail!("Trace file not found: {}", path.display());
    }
    let file =
        File::open(path).with_context(|| format!("Failed to open trace: {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Format a byte count for display.
fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.2} MiB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.2} KiB", b as f64 / 1024.0),
        b => format!("{} B", b),
    }
}
