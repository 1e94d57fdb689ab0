//! Arena read/write implementation.

use super::config::ArenaConfig;
use crate::error::{Result, TraceError};
use crate::types::{PackedRef, PageId};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared arena state.
struct ArenaInner {
    /// Pages in allocation order; only the last one is appended to.
    pages: Vec<Vec<u8>>,
    /// Bytes stored across all pages.
    used: u64,
}

/// Arena usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Bytes stored.
    pub bytes_used: u64,
    /// Pages allocated.
    pub pages: u32,
    /// Configured byte limit.
    pub byte_limit: u64,
}

/// A cheaply clonable handle to a channel's packed-block storage.
#[derive(Clone)]
pub struct PackedArena {
    inner: Arc<RwLock<ArenaInner>>,
    config: ArenaConfig,
}

impl PackedArena {
    /// Create an empty arena.
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ArenaInner {
                pages: Vec::new(),
                used: 0,
            })),
            config,
        }
    }

    /// The configuration this arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Append one block.
    pub fn append(&self, bytes: &[u8]) -> Result<PackedRef> {
        let mut refs = self.append_batch([bytes])?;
        refs.pop().ok_or_else(|| TraceError::PackedRef {
            reference: "<none>".to_string(),
            cause: "append produced no reference".to_string(),
        })
    }

    /// Append several blocks under one lock acquisition.
    ///
    /// Either every block is stored or none is.
    pub fn append_batch<'a, I>(&self, blocks: I) -> Result<Vec<PackedRef>>
    where
        I: IntoIterator<Item = &'a [u8]>,
        I::IntoIter: Clone,
    {
        let blocks = blocks.into_iter();
        let requested: u64 = blocks.clone().map(|b| b.len() as u64).sum();

        let mut inner = self.inner.write();
        if inner.used + requested > self.config.byte_limit {
            return Err(TraceError::ArenaExhausted {
                requested,
                limit: self.config.byte_limit,
            });
        }

        let page_size = self.config.page_size as usize;
        let mut refs = Vec::with_capacity(blocks.size_hint().0);
        for bytes in blocks {
            let fits = inner
                .pages
                .last()
                .is_some_and(|p| p.len() + bytes.len() <= page_size);
            if !fits {
                inner
                    .pages
                    .push(Vec::with_capacity(page_size.max(bytes.len())));
            }

            let page_index = inner.pages.len() - 1;
            let page = &mut inner.pages[page_index];
            let offset = page.len();
            page.extend_from_slice(bytes);
            refs.push(PackedRef::new(
                PageId::new(page_index as u32),
                offset as u32,
                bytes.len() as u32,
            ));
        }
        inner.used += requested;
        Ok(refs)
    }

    /// Replace the contents of `out` with the bytes of a stored block.
    ///
    /// The read lock is held only for the copy.
    pub fn copy_into(&self, packed: PackedRef, out: &mut Vec<u8>) -> Result<()> {
        let inner = self.inner.read();
        let bytes = inner
            .pages
            .get(packed.page().index())
            .and_then(|p| p.get(packed.range()))
            .ok_or_else(|| TraceError::PackedRef {
                reference: packed.to_string(),
                cause: format!("arena holds {} pages", inner.pages.len()),
            })?;
        out.clear();
        out.extend_from_slice(bytes);
        Ok(())
    }

    /// Bytes stored so far.
    pub fn bytes_used(&self) -> u64 {
        self.inner.read().used
    }

    /// Current usage counters.
    pub fn stats(&self) -> ArenaStats {
        let inner = self.inner.read();
        ArenaStats {
            bytes_used: inner.used,
            pages: inner.pages.len() as u32,
            byte_limit: self.config.byte_limit,
        }
    }
}

impl std::fmt::Debug for PackedArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedArena")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl PackedArena {
        fn read_bytes(&self, packed: PackedRef) -> Result<Vec<u8>> {
            let mut out = Vec::new();
            self.copy_into(packed, &mut out)?;
            Ok(out)
        }
    }

    #[test]
    fn arena_write_and_read_bytes() {
        let arena = PackedArena::new(ArenaConfig::small());

        let data = b"packed block";
        let r = arena.append(data).unwrap();
        assert!(!r.is_empty());
        assert_eq!(arena.read_bytes(r).unwrap(), data);
        assert_eq!(arena.bytes_used(), data.len() as u64);
    }

    #[test]
    fn arena_multiple_writes_span_pages() {
        let arena = PackedArena::new(ArenaConfig::small().with_page_size(64));

        let items: Vec<Vec<u8>> = (0..100u8).map(|i| vec![i; 1 + i as usize % 40]).collect();
        let refs = arena
            .append_batch(items.iter().map(Vec::as_slice))
            .unwrap();

        for (r, expected) in refs.iter().zip(&items) {
            assert_eq!(&arena.read_bytes(*r).unwrap(), expected);
            assert!(r.offset() + r.len() <= 64);
        }
        assert!(arena.stats().pages > 1);
    }

    #[test]
    fn oversized_block_gets_its_own_page() {
        let arena = PackedArena::new(ArenaConfig::small().with_page_size(16));
        let big = vec![7u8; 100];
        let r = arena.append(&big).unwrap();
        assert_eq!(r.offset(), 0);
        assert_eq!(arena.read_bytes(r).unwrap(), big);
    }

    #[test]
    fn arena_capacity_check() {
        let arena = PackedArena::new(ArenaConfig::small().with_byte_limit(250));
        let data = [1u8; 100];

        assert!(arena.append(&data).is_ok());
        assert!(arena.append(&data).is_ok());
        let err = arena.append(&data).unwrap_err();
        assert!(matches!(
            err,
            TraceError::ArenaExhausted {
                requested: 100,
                limit: 250
            }
        ));
        // A failed batch stores nothing.
        assert_eq!(arena.bytes_used(), 200);
    }

    #[test]
    fn unknown_reference_is_rejected() {
        let arena = PackedArena::new(ArenaConfig::small());
        let bogus = PackedRef::new(PageId::new(3), 0, 4);
        assert_eq!(arena.read_bytes(bogus).unwrap_err().code(), "E010");
    }

    #[test]
    fn clones_share_storage() {
        let arena = PackedArena::new(ArenaConfig::small());
        let writer = arena.clone();
        let r = std::thread::spawn(move || writer.append(b"from worker").unwrap())
            .join()
            .unwrap();
        assert_eq!(arena.read_bytes(r).unwrap(), b"from worker");
    }

    #[test]
    fn copy_into_replaces_buffer_and_releases_lock() {
        let arena = PackedArena::new(ArenaConfig::small());
        let long = arena.append(&[9u8; 40]).unwrap();
        let short = arena.append(b"abc").unwrap();

        let mut buf = Vec::new();
        arena.copy_into(long, &mut buf).unwrap();
        arena.copy_into(short, &mut buf).unwrap();
        assert_eq!(buf, b"abc");

        // Appending right after a copy must not contend with a held guard.
        assert!(arena.inner.try_write().is_some());
        arena.append(b"next").unwrap();
    }
}
