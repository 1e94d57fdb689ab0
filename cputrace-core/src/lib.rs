//! cputrace Core Library
//!
//! Capture, compression, and persistence of per-instruction CPU history for
//! an 8-bit CPU emulator.
//!
//! # Overview
//!
//! A capture thread appends one [`HistoryEntry`] per retired instruction to a
//! [`CpuHistoryChannel`]. Closed chunks are packed in the background with a
//! chain of reversible row predictors and a zero-suppressing codec, and stay
//! readable by index or by time. A channel can be saved to a self-describing
//! trace file and loaded back into a new channel.
//!
//! # Key Components
//!
//! - **Format**: access masks, predictors, codecs, row schemas, and the
//!   predictor fusion pass
//! - **History**: the capture channel with its tail ring, packing workers, and
//!   decoded-block cache
//! - **Arena**: paged storage for packed blocks
//! - **Trace I/O**: the trace file container, manifest, save, load, and replay
//! - **Testing**: a seeded synthetic instruction stream
//!
//! # Example
//!
//! ```
//! use cputrace_core::prelude::*;
//!
//! let mut channel = CpuHistoryChannel::new(HistoryConfig::new("CPU"))?;
//! channel.begin_events();
//! for i in 0..1000u32 {
//!     let he = HistoryEntry { cycle: i * 3, unhalted_cycle: i * 3, ..Default::default() };
//!     channel.add_event(u64::from(i * 3), &he);
//! }
//! channel.end_events()?;
//!
//! let mut file = Vec::new();
//! save_cpu_history(&mut channel, &mut file, &SaveOptions::default())?;
//!
//! let mut loaded = load_cpu_history(file.as_slice(), &LoadOptions::default())?;
//! assert_eq!(loaded.event_count(), 1000);
//! assert_eq!(loaded.event(999)?.map(|he| he.cycle), Some(2997));
//! # Ok::<(), cputrace_core::TraceError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod error;
pub mod format;
pub mod history;
pub mod prelude;
pub mod testing;
pub mod trace_io;
pub mod types;

// Re-export key types at crate root for convenience
pub use arena::{ArenaConfig, PackedArena};
pub use error::{ErrorKind, Result, TraceError};
pub use format::{Codec, Predictor, PredictorPipeline, RowSchema};
pub use history::{CpuHistoryChannel, HistoryConfig};
pub use trace_io::{LoadOptions, SaveOptions, load_cpu_history, save_cpu_history};
pub use types::{EA_NONE, HistoryEntry, PackedRef};
