//! Handle types for packed-block storage.
//!
//! Packed streams never leave the arena as raw pointers. Workers and the
//! capture thread exchange `PackedRef` values instead, and resolve them
//! through the arena when the bytes are needed.

use std::fmt;

/// Index of one page inside a [`PackedArena`](crate::arena::PackedArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u32);

impl PageId {
    /// Create a page identifier.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw page index.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Get the page index for slice access.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page_{}", self.0)
    }
}

/// Location of one packed stream: `(page, offset, len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedRef {
    page: PageId,
    offset: u32,
    len: u32,
}

impl PackedRef {
    /// Create a new packed stream reference.
    #[must_use]
    pub const fn new(page: PageId, offset: u32, len: u32) -> Self {
        Self { page, offset, len }
    }

    /// Page holding the stream.
    #[must_use]
    pub const fn page(&self) -> PageId {
        self.page
    }

    /// Byte offset of the stream inside its page.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Length of the stream in bytes.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Check if the stream is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte range of the stream inside its page.
    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.len as usize
    }
}

impl fmt::Display for PackedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+0x{:06x}[{}]", self.page, self.offset, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_ref_range() {
        let r = PackedRef::new(PageId::new(3), 0x40, 12);
        assert_eq!(r.range(), 0x40..0x4c);
        assert_eq!(r.page().index(), 3);
        assert!(!r.is_empty());
    }

    #[test]
    fn packed_ref_display() {
        let r = PackedRef::new(PageId::new(1), 0x1234, 8);
        assert_eq!(format!("{}", r), "page_1+0x001234[8]");
    }
}
