//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Example
//!
//! ```
//! use cputrace_core::prelude::*;
//! ```

// Core types
pub use crate::types::{EA_NONE, HistoryEntry, PackedRef, PageId};

// Error handling
pub use crate::error::{ErrorKind, Result, TraceError};

// Arena
pub use crate::arena::{ArenaConfig, ArenaStats, PackedArena};

// Format
pub use crate::format::{
    AccessMask, Codec, Column, ColumnKind, Predictor, PredictorPipeline, RowCodec, RowPredictor,
    RowSchema, optimize_predictors,
};

// Capture
pub use crate::history::{CpuHistoryChannel, HistoryConfig};

// Trace files
pub use crate::trace_io::{
    HistoryDecoder, LoadOptions, SaveOptions, SaveSummary, TraceInfo, TraceManifest,
    load_cpu_history, read_trace_info, save_cpu_history,
};
