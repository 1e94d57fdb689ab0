//! Per-byte read/write sets used to decide whether predictor stages may be
//! reordered.

use crate::error::{Result, TraceError};

/// A bitset with one bit per row byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteMask {
    words: Vec<u32>,
}

impl ByteMask {
    fn new(row_size: u32) -> Self {
        Self {
            words: vec![0; row_size.div_ceil(32) as usize],
        }
    }

    fn mark(&mut self, offset: u32, len: u32) {
        for byte in offset..offset + len {
            self.words[(byte >> 5) as usize] |= 1 << (byte & 31);
        }
    }

    /// Check whether byte `index` is set.
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.words
            .get((index >> 5) as usize)
            .is_some_and(|w| w & (1 << (index & 31)) != 0)
    }

    /// Check whether any byte is set in both masks.
    #[must_use]
    pub fn overlaps(&self, other: &ByteMask) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & b != 0)
    }

    /// Union `other` into this mask.
    pub fn merge(&mut self, other: &ByteMask) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
    }

    /// Check whether no byte is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }
}

/// The bytes a predictor stage reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessMask {
    row_size: u32,
    read: ByteMask,
    write: ByteMask,
}

impl AccessMask {
    /// Create an empty mask for rows of `row_size` bytes.
    #[must_use]
    pub fn new(row_size: u32) -> Self {
        Self {
            row_size,
            read: ByteMask::new(row_size),
            write: ByteMask::new(row_size),
        }
    }

    /// Width of the row this mask describes.
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Bytes read by the stage.
    #[must_use]
    pub fn reads(&self) -> &ByteMask {
        &self.read
    }

    /// Bytes written by the stage.
    #[must_use]
    pub fn writes(&self) -> &ByteMask {
        &self.write
    }

    /// Check that `offset..offset + len` lies inside the row.
    pub fn check_range(&self, offset: u32, len: u32) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.row_size => Ok(()),
            _ => Err(TraceError::PredictorRange {
                offset,
                len,
                row_size: self.row_size,
            }),
        }
    }

    /// Record a read of `len` bytes at `offset`.
    pub fn mark_read(&mut self, offset: u32, len: u32) -> Result<()> {
        self.check_range(offset, len)?;
        self.read.mark(offset, len);
        Ok(())
    }

    /// Record a write of `len` bytes at `offset`.
    pub fn mark_write(&mut self, offset: u32, len: u32) -> Result<()> {
        self.check_range(offset, len)?;
        self.write.mark(offset, len);
        Ok(())
    }

    /// Record an in-place update of `len` bytes at `offset`.
    pub fn mark_read_write(&mut self, offset: u32, len: u32) -> Result<()> {
        self.check_range(offset, len)?;
        self.read.mark(offset, len);
        self.write.mark(offset, len);
        Ok(())
    }

    /// Union another stage's accesses into this one.
    pub fn merge(&mut self, other: &AccessMask) {
        debug_assert_eq!(self.row_size, other.row_size);
        self.read.merge(&other.read);
        self.write.merge(&other.write);
    }

    /// Check whether two stages can run in either order with the same result.
    ///
    /// Neither may write a byte the other reads or writes.
    #[must_use]
    pub fn can_swap_with(&self, other: &AccessMask) -> bool {
        !self.read.overlaps(&other.write)
            && !self.write.overlaps(&other.read)
            && !self.write.overlaps(&other.write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_cover_requested_bytes() {
        let mut mask = AccessMask::new(40);
        mask.mark_read(30, 4).unwrap();
        mask.mark_write(0, 1).unwrap();

        assert!(mask.reads().contains(30));
        assert!(mask.reads().contains(33));
        assert!(!mask.reads().contains(34));
        assert!(mask.writes().contains(0));
        assert!(!mask.writes().contains(30));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut mask = AccessMask::new(24);
        assert!(mask.mark_read(22, 2).is_ok());
        assert!(matches!(
            mask.mark_read(23, 2),
            Err(TraceError::PredictorRange { offset: 23, .. })
        ));
        assert!(mask.mark_write(24, 1).is_err());
        assert!(mask.mark_read_write(u32::MAX, 2).is_err());
    }

    #[test]
    fn disjoint_stages_can_swap() {
        let mut a = AccessMask::new(24);
        a.mark_read_write(0, 2).unwrap();
        let mut b = AccessMask::new(24);
        b.mark_read_write(2, 2).unwrap();
        assert!(a.can_swap_with(&b));
        assert!(b.can_swap_with(&a));
    }

    #[test]
    fn shared_reads_can_swap() {
        let mut a = AccessMask::new(24);
        a.mark_read(8, 2).unwrap();
        let mut b = AccessMask::new(24);
        b.mark_read(8, 2).unwrap();
        assert!(a.can_swap_with(&b));
    }

    #[test]
    fn read_after_write_cannot_swap() {
        let mut writer = AccessMask::new(24);
        writer.mark_read_write(8, 2).unwrap();
        let mut reader = AccessMask::new(24);
        reader.mark_read(8, 2).unwrap();
        reader.mark_read_write(16, 4).unwrap();
        assert!(!writer.can_swap_with(&reader));
        assert!(!reader.can_swap_with(&writer));
    }

    #[test]
    fn merge_unions_both_sets() {
        let mut a = AccessMask::new(64);
        a.mark_read(0, 1).unwrap();
        let mut b = AccessMask::new(64);
        b.mark_write(63, 1).unwrap();
        a.merge(&b);
        assert!(a.reads().contains(0));
        assert!(a.writes().contains(63));
        assert!(!a.writes().is_empty());
    }
}
