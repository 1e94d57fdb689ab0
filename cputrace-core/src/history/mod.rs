//! Live CPU history capture.
//!
//! A [`CpuHistoryChannel`] records one [`HistoryEntry`] per retired
//! instruction into a ring of 64-row blocks. Every 256 blocks form a chunk;
//! when a chunk closes it is handed to a background worker that packs each
//! block with the live predictor pipeline and the sparse codec into the
//! channel's [`PackedArena`]. Packed blocks are decoded on demand into a small
//! LRU cache for random access.
//!
//! ```text
//!   add_event ──► head block ──► chunk closes ──► worker packs ──► retire
//!                 (tail ring, 4 chunks × 256 blocks × 64 rows)     (capture thread,
//!                                                                   FIFO order)
//! ```
//!
//! Rows stay readable at every stage: tail blocks are read in place, packed
//! blocks through the cache.
//!
//! [`HistoryEntry`]: crate::types::HistoryEntry
//! [`PackedArena`]: crate::arena::PackedArena

mod cache;
mod channel;
mod config;
mod packer;
mod ring;
mod row;
mod worker;

pub use channel::CpuHistoryChannel;
pub use config::{DEFAULT_WORKER_THREADS, HistoryConfig};
pub use row::{read_live_row, write_live_row};

/// Rows per block.
pub const BLOCK_ROWS: usize = 64;

/// `log2(BLOCK_ROWS)`.
pub const BLOCK_SHIFT: u32 = 6;

/// Blocks held by the tail ring.
pub const TAIL_BLOCKS: u32 = 1024;

/// Chunks in the tail ring.
pub const CHUNK_COUNT: u32 = 4;

/// Blocks per chunk; the unit of background packing.
pub const CHUNK_BLOCKS: u32 = TAIL_BLOCKS / CHUNK_COUNT;

/// Decoded blocks kept for random access.
pub const CACHE_SLOTS: usize = 8;
