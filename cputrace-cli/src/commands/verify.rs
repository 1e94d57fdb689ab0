//! Verify command - fully decode a trace and classify any failure.

use anyhow::Result;
use cputrace_core::trace_io::{LoadOptions, load_cpu_history};
use cputrace_core::{ErrorKind, TraceError};
use std::path::Path;
use std::time::Instant;

use super::open_trace;

/// How a failed load should be reported.
fn classify(err: &TraceError) -> &'static str {
    match err.kind() {
        ErrorKind::Invalid => "corrupt",
        ErrorKind::Unsupported => "unsupported",
        ErrorKind::Resource => "out of resources",
        ErrorKind::Io => "I/O failure",
    }
}

/// Run the verify command.
pub fn run(path: &Path) -> Result<()> {
    tracing::info!(path = %path.display(), "Verifying trace");
    let reader = open_trace(path)?;

    println!("Verification Results for: {}", path.display());
    println!("==========================={}", "=".repeat(path.display().to_string().len()));

    let started = Instant::now();
    let channel = match load_cpu_history(reader, &LoadOptions::default()) {
        Ok(channel) => channel,
        Err(e) => {
            println!("✗ {} ({}): {}", classify(&e).to_uppercase(), e.code(), e);
            anyhow::bail!("Trace is {}", classify(&e));
        }
    };

    println!("✓ Trace decoded in {:.2?}", started.elapsed());
    println!("  Channel:  {}", channel.name());
    println!("  Rows:     {}", channel.event_count());
    println!("  Duration: {:.6} s", channel.duration());
    Ok(())
}
