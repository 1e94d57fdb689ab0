//! Block packing and unpacking.

use super::BLOCK_ROWS;
use super::row::{read_live_row, write_live_row};
use crate::arena::PackedArena;
use crate::error::{Result, TraceError};
use crate::format::{LIVE_ROW_SIZE, PredictorPipeline, RowCodec, SparseCodec};
use crate::types::{HistoryEntry, PackedRef};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

const ROW_SIZE: usize = LIVE_ROW_SIZE as usize;

/// Converts between 64-row blocks and their packed bytes.
///
/// Every block is an independent stream: predictor state is reset before
/// each one, so any packed block decodes without its neighbours.
pub(crate) struct BlockCodec {
    pipeline: PredictorPipeline,
    rows: Vec<u8>,
}

impl BlockCodec {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            pipeline: PredictorPipeline::live()?,
            rows: vec![0; BLOCK_ROWS * ROW_SIZE],
        })
    }

    /// Append the packed form of `block` to `out`.
    pub(crate) fn pack(&mut self, block: &[HistoryEntry], out: &mut Vec<u8>) -> Result<()> {
        let rows = &mut self.rows[..block.len() * ROW_SIZE];
        for (he, row) in block.iter().zip(rows.chunks_exact_mut(ROW_SIZE)) {
            write_live_row(he, row);
        }
        self.pipeline.reset();
        self.pipeline.encode(rows);
        SparseCodec.encode(rows, ROW_SIZE, out)
    }

    /// Decode a packed block into `out`, which sets the row count.
    pub(crate) fn unpack(&mut self, packed: &[u8], out: &mut [HistoryEntry]) -> Result<()> {
        let rows = &mut self.rows[..out.len() * ROW_SIZE];
        SparseCodec.decode(packed, ROW_SIZE, rows)?;
        self.pipeline.reset();
        self.pipeline.decode(rows);
        for (he, row) in out.iter_mut().zip(rows.chunks_exact(ROW_SIZE)) {
            *he = read_live_row(row);
        }
        Ok(())
    }
}

/// Pack every block of a chunk and store them in `arena` as one batch.
pub(crate) fn pack_chunk(rows: &[HistoryEntry], arena: &PackedArena) -> Result<Vec<PackedRef>> {
    let mut codec = BlockCodec::new()?;
    let mut packed = Vec::with_capacity(rows.len() / BLOCK_ROWS);
    for block in rows.chunks(BLOCK_ROWS) {
        let mut bytes = Vec::new();
        codec.pack(block, &mut bytes)?;
        packed.push(bytes);
    }
    arena.append_batch(packed.iter().map(Vec::as_slice))
}

/// Run a packing job, turning a panic into [`TraceError::WorkerFailed`].
pub(crate) fn run_guarded<T>(chunk: u32, job: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        Err(TraceError::WorkerFailed {
            chunk,
            cause: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
