//! Saving and loading CPU history trace files.
//!
//! A trace file is a small binary container holding a JSON manifest and one
//! block per row group. The manifest names the row schema, codec, and
//! predictor chain, so a reader needs nothing else to decode the rows:
//!
//! ```text
//! save:  channel ─► 24-byte rows ─► predictors (encode) ─► codec ─► block
//! load:  block ─► codec ─► predictors (decode) ─► HistoryDecoder ─► new channel
//! ```

mod container;
mod load;
mod manifest;
mod options;
mod replay;
mod save;

pub use container::{
    ContainerReader, ContainerWriter, FORMAT_VERSION, HEADER_SIZE, TRACE_MAGIC, TraceHeader,
};
pub use load::{MAX_LOAD_ROW_SIZE, MAX_PREDICTORS, TraceInfo, load_cpu_history, read_trace_info};
pub use manifest::TraceManifest;
pub use options::{DEFAULT_ROW_GROUP_SIZE, LoadOptions, ProgressFn, SaveOptions};
pub use replay::HistoryDecoder;
pub use save::{SaveSummary, pack_standard_row, save_cpu_history};
