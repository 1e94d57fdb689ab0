//! Background chunk packing.

use super::config::HistoryConfig;
use super::ring::ChunkRows;
use super::worker::{pack_chunk, run_guarded};
use crate::arena::PackedArena;
use crate::error::{Result, TraceError};
use crate::types::PackedRef;
use crossbeam::channel::{Receiver, bounded};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

enum PackTask {
    /// Packing on the pool; the result arrives on the receiver.
    Async {
        result: Receiver<Result<Vec<PackedRef>>>,
    },
    /// Packed on the capture thread when retired.
    Deferred { rows: Arc<ChunkRows> },
}

struct Pending {
    /// Ring chunk the task reads.
    slot: u32,
    /// Position of the chunk in the trace.
    seq: u32,
    task: PackTask,
}

/// FIFO of closed chunks awaiting packing.
pub(crate) struct Packer {
    pool: Option<rayon::ThreadPool>,
    arena: PackedArena,
    pending: VecDeque<Pending>,
    next_seq: u32,
}

impl Packer {
    pub(crate) fn new(config: &HistoryConfig, arena: PackedArena) -> Result<Self> {
        let pool = if config.async_packing {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.effective_worker_threads())
                .thread_name(|i| format!("cputrace-pack-{}", i))
                .build()
                .map_err(|e| TraceError::ThreadPool {
                    cause: e.to_string(),
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            pool,
            arena,
            pending: VecDeque::new(),
            next_seq: 0,
        })
    }

    /// Queue a closed chunk.
    pub(crate) fn launch(&mut self, slot: u32, rows: Arc<ChunkRows>) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let task = match &self.pool {
            Some(pool) => {
                let (tx, rx) = bounded(1);
                let arena = self.arena.clone();
                pool.spawn(move || {
                    let result = run_guarded(seq, || pack_chunk(&rows, &arena));
                    // The chunk must be released before the result is visible.
                    drop(rows);
                    let _ = tx.send(result);
                });
                PackTask::Async { result: rx }
            }
            None => PackTask::Deferred { rows },
        };

        trace!(chunk = seq, slot, "chunk queued for packing");
        self.pending.push_back(Pending { slot, seq, task });
    }

    /// Check whether `slot` is still being read by a queued task.
    pub(crate) fn is_pending(&self, slot: u32) -> bool {
        self.pending.iter().any(|p| p.slot == slot)
    }

    /// Number of queued chunks.
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Wait for the oldest queued chunk and return its block references.
    pub(crate) fn retire_next(&mut self) -> Option<(u32, Result<Vec<PackedRef>>)> {
        let Pending { seq, task, .. } = self.pending.pop_front()?;
        let result = match task {
            PackTask::Async { result } => result.recv().unwrap_or_else(|_| {
                Err(TraceError::WorkerFailed {
                    chunk: seq,
                    cause: "worker exited without reporting".to_string(),
                })
            }),
            PackTask::Deferred { rows } => {
                let arena = &self.arena;
                run_guarded(seq, || pack_chunk(&rows, arena))
            }
        };
        Some((seq, result))
    }

    /// Drop every queued chunk, waiting for in-flight workers to finish.
    pub(crate) fn discard_all(&mut self) {
        for pending in self.pending.drain(..) {
            if let PackTask::Async { result } = pending.task {
                let _ = result.recv();
            }
        }
    }
}
