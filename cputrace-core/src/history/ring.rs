//! Unpacked tail storage.

use super::{BLOCK_ROWS, CHUNK_BLOCKS, CHUNK_COUNT, TAIL_BLOCKS};
use crate::types::HistoryEntry;
use std::sync::Arc;

/// Rows of one chunk: `CHUNK_BLOCKS` blocks of `BLOCK_ROWS` rows.
pub(crate) type ChunkRows = Box<[HistoryEntry]>;

const CHUNK_ROWS: usize = CHUNK_BLOCKS as usize * BLOCK_ROWS;

/// The most recent `TAIL_BLOCKS` blocks, grouped into chunks.
///
/// Chunks are reference counted so a closed chunk can be packed on a worker
/// while the capture thread keeps reading it. A write into a chunk that a
/// packing task still holds copies the chunk first; once the packing is
/// retired, writes go in place.
pub(crate) struct TailRing {
    chunks: [Arc<ChunkRows>; CHUNK_COUNT as usize],
}

impl TailRing {
    pub(crate) fn new() -> Self {
        Self {
            chunks: std::array::from_fn(|_| {
                Arc::new(vec![HistoryEntry::default(); CHUNK_ROWS].into_boxed_slice())
            }),
        }
    }

    fn locate(block_no: u32) -> (usize, usize) {
        let slot = block_no % TAIL_BLOCKS;
        let chunk = (slot / CHUNK_BLOCKS) as usize;
        let first = (slot % CHUNK_BLOCKS) as usize * BLOCK_ROWS;
        (chunk, first)
    }

    /// The rows of the ring slot holding `block_no`.
    pub(crate) fn block(&self, block_no: u32) -> &[HistoryEntry] {
        let (chunk, first) = Self::locate(block_no);
        &self.chunks[chunk][first..first + BLOCK_ROWS]
    }

    /// Store one row.
    pub(crate) fn write(&mut self, block_no: u32, row: usize, he: HistoryEntry) {
        let (chunk, first) = Self::locate(block_no);
        Arc::make_mut(&mut self.chunks[chunk])[first + row] = he;
    }

    /// Share a chunk with a packing task.
    pub(crate) fn share(&self, chunk: u32) -> Arc<ChunkRows> {
        Arc::clone(&self.chunks[chunk as usize])
    }
}
