//! Decoded-block cache for random access to packed history.

use super::worker::BlockCodec;
use super::{BLOCK_ROWS, CACHE_SLOTS};
use crate::arena::PackedArena;
use crate::error::Result;
use crate::types::{HistoryEntry, PackedRef};
use tracing::trace;

const EMPTY: u32 = u32::MAX;

/// A few decoded blocks with least-recently-used replacement.
///
/// Ages are kept in a wrapping 8-bit clock; the slot with the largest
/// `clock - last_use` is evicted.
pub(crate) struct BlockCache {
    rows: Vec<HistoryEntry>,
    ids: [u32; CACHE_SLOTS],
    last_use: [u8; CACHE_SLOTS],
    clock: u8,
    /// Slot each packed block was last decoded into.
    slot_of: Vec<u8>,
    /// Packed bytes of the block being decoded.
    scratch: Vec<u8>,
    codec: BlockCodec,
}

impl BlockCache {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            rows: vec![HistoryEntry::default(); CACHE_SLOTS * BLOCK_ROWS],
            ids: [EMPTY; CACHE_SLOTS],
            last_use: std::array::from_fn(|i| i as u8),
            clock: CACHE_SLOTS as u8,
            slot_of: Vec::new(),
            scratch: Vec::new(),
            codec: BlockCodec::new()?,
        })
    }

    fn slot_rows(&self, slot: usize) -> &[HistoryEntry] {
        &self.rows[slot * BLOCK_ROWS..(slot + 1) * BLOCK_ROWS]
    }

    fn oldest_slot(&self) -> usize {
        let mut victim = 0;
        let mut oldest = 0u8;
        for (slot, &used) in self.last_use.iter().enumerate() {
            let age = self.clock.wrapping_sub(used);
            if age > oldest {
                oldest = age;
                victim = slot;
            }
        }
        victim
    }

    /// Rows of packed block `id`, decoding it if it is not cached.
    pub(crate) fn get(
        &mut self,
        id: u32,
        packed: PackedRef,
        arena: &PackedArena,
    ) -> Result<&[HistoryEntry]> {
        let index = id as usize;
        if self.slot_of.len() <= index {
            self.slot_of.resize(index + 1, 0);
        }

        let hint = self.slot_of[index] as usize;
        if self.ids[hint] == id {
            self.last_use[hint] = self.clock;
            self.clock = self.clock.wrapping_add(1);
            return Ok(self.slot_rows(hint));
        }

        let slot = self.oldest_slot();
        self.last_use[slot] = self.clock;
        self.clock = self.clock.wrapping_add(1);
        self.ids[slot] = EMPTY;

        arena.copy_into(packed, &mut self.scratch)?;
        let out = &mut self.rows[slot * BLOCK_ROWS..(slot + 1) * BLOCK_ROWS];
        self.codec.unpack(&self.scratch, out)?;

        trace!(block = id, slot, "decoded packed block");
        self.ids[slot] = id;
        self.slot_of[index] = slot as u8;
        Ok(self.slot_rows(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;

    fn packed_blocks(arena: &PackedArena, count: u32) -> Vec<PackedRef> {
        let mut codec = BlockCodec::new().unwrap();
        (0..count)
            .map(|b| {
                let block: Vec<_> = (0..BLOCK_ROWS as u32)
                    .map(|i| HistoryEntry {
                        cycle: b * 1000 + i,
                        ..Default::default()
                    })
                    .collect();
                let mut bytes = Vec::new();
                codec.pack(&block, &mut bytes).unwrap();
                arena.append(&bytes).unwrap()
            })
            .collect()
    }

    #[test]
    fn hits_and_evictions_return_correct_rows() {
        let arena = PackedArena::new(ArenaConfig::small());
        let refs = packed_blocks(&arena, 20);
        let mut cache = BlockCache::new().unwrap();

        for round in 0..3 {
            for (id, r) in refs.iter().enumerate() {
                let id = id as u32;
                let rows = cache.get(id, *r, &arena).unwrap();
                assert_eq!(rows[5].cycle, id * 1000 + 5, "round {}", round);
            }
        }
    }

    #[test]
    fn recently_used_block_survives() {
        let arena = PackedArena::new(ArenaConfig::small());
        let refs = packed_blocks(&arena, CACHE_SLOTS as u32 + 1);
        let mut cache = BlockCache::new().unwrap();

        for (id, r) in refs.iter().enumerate().take(CACHE_SLOTS) {
            cache.get(id as u32, *r, &arena).unwrap();
        }
        // Touch block 0, then load one more; block 1 is now the oldest.
        cache.get(0, refs[0], &arena).unwrap();
        cache.get(CACHE_SLOTS as u32, refs[CACHE_SLOTS], &arena).unwrap();

        assert!(cache.ids.contains(&0));
        assert!(!cache.ids.contains(&1));
    }

    #[test]
    fn clock_wraps() {
        let arena = PackedArena::new(ArenaConfig::small());
        let refs = packed_blocks(&arena, 3);
        let mut cache = BlockCache::new().unwrap();
        for i in 0..1000u32 {
            let id = i % 3;
            let rows = cache.get(id, refs[id as usize], &arena).unwrap();
            assert_eq!(rows[0].cycle, id * 1000);
        }
    }
}
