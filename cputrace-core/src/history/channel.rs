//! The CPU history capture channel.

use super::cache::BlockCache;
use super::config::HistoryConfig;
use super::packer::Packer;
use super::ring::TailRing;
use super::{BLOCK_ROWS, BLOCK_SHIFT, CHUNK_BLOCKS, CHUNK_COUNT, TAIL_BLOCKS};
use crate::arena::{ArenaStats, PackedArena};
use crate::error::{Result, TraceError};
use crate::types::{HistoryEntry, PackedRef};
use tracing::{debug, error, info};

const BLOCK_MASK: u32 = BLOCK_ROWS as u32 - 1;

/// Append-only store of CPU history rows with time-indexed random access.
///
/// Events are appended from a single capture thread. Closed chunks are packed
/// in the background; reads work uniformly across packed and unpacked blocks.
///
/// # Example
///
/// ```
/// use cputrace_core::{CpuHistoryChannel, HistoryConfig, HistoryEntry};
///
/// let mut channel = CpuHistoryChannel::new(HistoryConfig::new("cpu")).unwrap();
/// channel.begin_events();
/// for i in 0..100u32 {
///     let he = HistoryEntry { cycle: i * 2, ..Default::default() };
///     channel.add_event(u64::from(i * 2), &he);
/// }
/// channel.end_events().unwrap();
///
/// assert_eq!(channel.event_count(), 100);
/// assert_eq!(channel.event(42).unwrap().unwrap().cycle, 84);
/// ```
pub struct CpuHistoryChannel {
    config: HistoryConfig,
    arena: PackedArena,
    packer: Packer,
    cache: BlockCache,
    ring: TailRing,
    /// Start time of every block, in seconds.
    block_times: Vec<f64>,
    /// Arena location of each packed block, indexed by block number.
    packed: Vec<PackedRef>,
    /// Block currently being filled.
    head_block: u32,
    /// Rows in the head block.
    tail_offset: u32,
    event_count: u32,
    iter_pos: u32,
    trace_size: u64,
    in_session: bool,
    fault: Option<String>,
}

impl CpuHistoryChannel {
    /// Create an empty channel.
    pub fn new(config: HistoryConfig) -> Result<Self> {
        let arena = PackedArena::new(config.arena.clone());
        let packer = Packer::new(&config, arena.clone())?;
        Ok(Self {
            arena,
            packer,
            cache: BlockCache::new()?,
            ring: TailRing::new(),
            block_times: Vec::new(),
            packed: Vec::new(),
            head_block: 0,
            tail_offset: 0,
            event_count: 0,
            iter_pos: 0,
            trace_size: 0,
            in_session: false,
            fault: None,
            config,
        })
    }

    /// Channel configuration.
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Seconds per tick.
    pub fn tick_scale(&self) -> f64 {
        self.config.tick_scale
    }

    /// Tick at which the trace starts.
    pub fn tick_offset(&self) -> u64 {
        self.config.tick_offset
    }

    /// Low 32 bits of the starting tick.
    pub fn history_base_cycle(&self) -> u32 {
        self.config.history_base_cycle()
    }

    /// Start a capture session.
    pub fn begin_events(&mut self) {
        debug!(channel = %self.config.name, "capture started");
        self.in_session = true;
    }

    /// End the capture session, waiting until every closed chunk is packed.
    pub fn end_events(&mut self) -> Result<()> {
        self.in_session = false;
        let result = self.flush();
        info!(
            channel = %self.config.name,
            events = self.event_count,
            packed_bytes = self.trace_size,
            "capture ended"
        );
        result
    }

    /// Check whether a session is open.
    pub(crate) fn in_session(&self) -> bool {
        self.in_session
    }

    /// Wait until every closed chunk is packed and retired.
    ///
    /// Fails with [`TraceError::CaptureFaulted`] if packing has failed.
    pub fn flush(&mut self) -> Result<()> {
        while self.packer.pending_len() > 0 && self.retire_next() {}
        self.check_fault()
    }

    /// Record one executed instruction.
    ///
    /// Effective addresses in the reserved range are stored as
    /// [`EA_NONE`](crate::types::EA_NONE). Ignored once the channel has
    /// faulted.
    pub fn add_event(&mut self, tick: u64, he: &HistoryEntry) {
        if self.fault.is_some() {
            return;
        }

        if self.tail_offset as usize == BLOCK_ROWS {
            let next = self.head_block + 1;
            if next % CHUNK_BLOCKS == 0 && !self.open_chunk(next) {
                return;
            }
            self.head_block = next;
            self.tail_offset = 0;
        }

        if self.tail_offset == 0 {
            let ticks = tick.wrapping_sub(self.config.tick_offset);
            self.block_times.push(ticks as f64 * self.config.tick_scale);
        }

        self.ring
            .write(self.head_block, self.tail_offset as usize, he.normalized());
        self.tail_offset += 1;
        self.event_count += 1;
    }

    /// Hand the chunk that just closed to the packer and make room for the one
    /// starting at `first_block`. Returns false if the channel faulted.
    fn open_chunk(&mut self, first_block: u32) -> bool {
        let opening = (first_block % TAIL_BLOCKS) / CHUNK_BLOCKS;
        let closing = (opening + CHUNK_COUNT - 1) % CHUNK_COUNT;
        debug!(
            channel = %self.config.name,
            first_block = first_block - CHUNK_BLOCKS,
            slot = closing,
            "chunk closed"
        );
        self.packer.launch(closing, self.ring.share(closing));

        while self.packer.is_pending(opening) {
            if !self.retire_next() {
                return false;
            }
        }
        true
    }

    /// Retire the oldest packing task. Returns false if the channel faulted.
    fn retire_next(&mut self) -> bool {
        let Some((chunk, result)) = self.packer.retire_next() else {
            return self.fault.is_none();
        };

        match result {
            Ok(refs) => {
                let bytes: u64 = refs.iter().map(|r| u64::from(r.len())).sum();
                self.trace_size += bytes;
                self.packed.extend(refs);
                debug!(
                    channel = %self.config.name,
                    chunk,
                    bytes,
                    packed_blocks = self.packed.len(),
                    "chunk retired"
                );
                true
            }
            Err(err) => {
                self.set_fault(err);
                false
            }
        }
    }

    fn set_fault(&mut self, err: TraceError) {
        error!(
            channel = %self.config.name,
            error = %err,
            "trace corrupted, capture disabled"
        );
        self.fault = Some(err.to_string());
        self.packer.discard_all();
    }

    fn check_fault(&self) -> Result<()> {
        match &self.fault {
            Some(cause) => Err(TraceError::CaptureFaulted {
                cause: cause.clone(),
            }),
            None => Ok(()),
        }
    }

    /// The failure that disabled capture, if any.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Rows recorded.
    pub fn event_count(&self) -> u32 {
        self.event_count
    }

    /// Check whether no rows have been recorded.
    pub fn is_empty(&self) -> bool {
        self.tail_offset == 0
    }

    /// Packed bytes retired so far.
    pub fn trace_size(&self) -> u64 {
        self.trace_size
    }

    /// Blocks moved into the arena.
    pub fn packed_block_count(&self) -> u32 {
        self.packed.len() as u32
    }

    /// Arena usage.
    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    /// Current iteration start, as an absolute row index.
    pub fn iteration_position(&self) -> u32 {
        self.iter_pos
    }

    /// Time from the trace start to the last recorded row.
    pub fn duration(&self) -> f64 {
        if self.tail_offset == 0 {
            return 0.0;
        }
        let rows = self.ring.block(self.head_block);
        let last = rows[self.tail_offset as usize - 1];
        let delta = last.cycle.wrapping_sub(rows[0].cycle) as i32;
        let block_time = self.block_times.last().copied().unwrap_or(0.0);
        block_time + f64::from(delta) * self.config.tick_scale
    }

    /// Rows stored in block `id`.
    fn block_len(&self, id: u32) -> usize {
        if id == self.head_block {
            self.tail_offset as usize
        } else {
            BLOCK_ROWS
        }
    }

    /// All `BLOCK_ROWS` slots of block `id`.
    fn block(&mut self, id: u32) -> Result<&[HistoryEntry]> {
        match self.packed.get(id as usize) {
            Some(&packed) => self.cache.get(id, packed, &self.arena),
            None => Ok(self.ring.block(id)),
        }
    }

    /// Rows of block `id` whose time is before `time`, or at or before it when
    /// `inclusive`.
    fn seek_in_block(&mut self, id: u32, time: f64, inclusive: bool) -> Result<usize> {
        let block_time = self.block_times[id as usize];
        let target = ((time - block_time) / self.config.tick_scale + 0.5) as i32;
        let len = self.block_len(id);
        let rows = &self.block(id)?[..len];
        let base = rows[0].cycle;
        Ok(rows.partition_point(|he| {
            let offset = he.cycle.wrapping_sub(base) as i32;
            if inclusive {
                offset <= target
            } else {
                offset < target
            }
        }))
    }

    /// Position iteration at the first row at or after `start_time`, then move
    /// by `event_offset` rows, clamped to the recorded range.
    ///
    /// A `start_time` at or before the first block resets iteration to row 0
    /// and ignores the offset.
    pub fn start_history_iteration(&mut self, start_time: f64, event_offset: i32) -> Result<()> {
        self.iter_pos = 0;

        if start_time > 0.0 && self.event_count > 0 {
            let block = self.block_times.partition_point(|&t| t < start_time) as u32;
            if block == 0 {
                return Ok(());
            }
            let id = block - 1;
            let index = self.seek_in_block(id, start_time, false)?;
            self.iter_pos = index as u32 + (id << BLOCK_SHIFT);
        }

        let pos = i64::from(self.iter_pos) + i64::from(event_offset);
        self.iter_pos = pos.clamp(0, i64::from(self.event_count)) as u32;
        Ok(())
    }

    /// Copy rows starting `offset` rows past the iteration start into `out`.
    ///
    /// Returns the number of rows copied: zero past the end, otherwise
    /// `out.len()` or the rows remaining, whichever is smaller.
    pub fn read_history_events(&mut self, out: &mut [HistoryEntry], offset: u32) -> Result<usize> {
        let fetch = self.iter_pos.saturating_add(offset);
        if fetch >= self.event_count {
            return Ok(0);
        }
        let n = out.len().min((self.event_count - fetch) as usize);

        let mut copied = 0;
        while copied < n {
            let pos = fetch + copied as u32;
            let within = (pos & BLOCK_MASK) as usize;
            let span = (BLOCK_ROWS - within).min(n - copied);
            let rows = self.block(pos >> BLOCK_SHIFT)?;
            out[copied..copied + span].copy_from_slice(&rows[within..within + span]);
            copied += span;
        }
        Ok(n)
    }

    /// Row at absolute `index`, or `None` past the end.
    pub fn event(&mut self, index: u32) -> Result<Option<HistoryEntry>> {
        if index >= self.event_count {
            return Ok(None);
        }
        let rows = self.block(index >> BLOCK_SHIFT)?;
        Ok(Some(rows[(index & BLOCK_MASK) as usize]))
    }

    /// Index, relative to the iteration start, of the last row at or before
    /// `time`. Zero when `time` precedes the iteration start.
    pub fn find_event(&mut self, time: f64) -> Result<u32> {
        if self.event_count == 0 {
            return Ok(0);
        }

        let start = self.iter_pos >> BLOCK_SHIFT;
        let times = self.block_times.get(start as usize..).unwrap_or_default();
        let count = times.partition_point(|&t| t <= time) as u32;
        if count == 0 {
            return Ok(0);
        }

        let id = start + count - 1;
        let index = self.seek_in_block(id, time, true)?;
        let pos = (index as u32 + (id << BLOCK_SHIFT)).saturating_sub(1);
        Ok(pos.saturating_sub(self.iter_pos))
    }

    /// Time of row `index`, relative to the iteration start. Indices past the
    /// end report [`duration`](Self::duration).
    pub fn event_time(&mut self, index: u32) -> Result<f64> {
        if index >= self.event_count - self.iter_pos {
            return Ok(self.duration());
        }
        let pos = index + self.iter_pos;
        let id = pos >> BLOCK_SHIFT;
        let block_time = self.block_times[id as usize];
        let scale = self.config.tick_scale;
        let rows = self.block(id)?;
        let delta = rows[(pos & BLOCK_MASK) as usize]
            .cycle
            .wrapping_sub(rows[0].cycle) as i32;
        Ok(f64::from(delta) * scale + block_time)
    }
}

impl Drop for CpuHistoryChannel {
    fn drop(&mut self) {
        if self.packer.pending_len() > 0 {
            debug!(
                channel = %self.config.name,
                pending = self.packer.pending_len(),
                "draining packing work"
            );
            self.packer.discard_all();
        }
    }
}

impl std::fmt::Debug for CpuHistoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuHistoryChannel")
            .field("name", &self.config.name)
            .field("event_count", &self.event_count)
            .field("packed_blocks", &self.packed.len())
            .field("trace_size", &self.trace_size)
            .field("in_session", &self.in_session)
            .field("fault", &self.fault)
            .finish()
    }
}
