//! Trace file container: header, manifest, and length-prefixed blocks.
//!
//! ```text
//! offset  size  field
//! 0       8     magic "CPUTRACE"
//! 8       4     format version
//! 12      4     flags
//! 16      4     manifest length
//! 20      4     manifest CRC32
//! 24      4     block count
//! 28      4     reserved
//! 32      n     manifest (JSON)
//! ...           blocks: [len u32][crc32 u32][bytes]
//! ```
//!
//! All integers are little-endian.

use crate::error::{Result, TraceError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// File identification bytes.
pub const TRACE_MAGIC: [u8; 8] = *b"CPUTRACE";

/// Current container format version.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed size of the header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Largest manifest accepted on read.
const MAX_MANIFEST_LEN: u32 = 16 * 1024 * 1024;

/// Container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    /// Format version.
    pub version: u32,
    /// Flags (reserved, zero).
    pub flags: u32,
    /// Manifest length in bytes.
    pub manifest_len: u32,
    /// CRC32 of the manifest bytes.
    pub manifest_crc: u32,
    /// Number of blocks following the manifest.
    pub block_count: u32,
}

impl TraceHeader {
    /// Header for `manifest` followed by `block_count` blocks.
    pub fn new(manifest: &[u8], block_count: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            flags: 0,
            manifest_len: manifest.len() as u32,
            manifest_crc: crc32fast::hash(manifest),
            block_count,
        }
    }

    /// Parse a header, checking magic and version.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        if bytes[..8] != TRACE_MAGIC {
            return Err(TraceError::CorruptContainer {
                cause: "bad magic".to_string(),
            });
        }

        let mut cursor = io::Cursor::new(&bytes[8..]);
        let read = |e| TraceError::io("reading header", e);
        let version = cursor.read_u32::<LittleEndian>().map_err(read)?;
        let flags = cursor.read_u32::<LittleEndian>().map_err(read)?;
        let manifest_len = cursor.read_u32::<LittleEndian>().map_err(read)?;
        let manifest_crc = cursor.read_u32::<LittleEndian>().map_err(read)?;
        let block_count = cursor.read_u32::<LittleEndian>().map_err(read)?;

        if version > FORMAT_VERSION {
            return Err(TraceError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        if version == 0 {
            return Err(TraceError::CorruptContainer {
                cause: "format version 0".to_string(),
            });
        }
        if manifest_len > MAX_MANIFEST_LEN {
            return Err(TraceError::CorruptContainer {
                cause: format!("manifest length {} is implausible", manifest_len),
            });
        }

        Ok(Self {
            version,
            flags,
            manifest_len,
            manifest_crc,
            block_count,
        })
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..8].copy_from_slice(&TRACE_MAGIC);
        let fields = [
            self.version,
            self.flags,
            self.manifest_len,
            self.manifest_crc,
            self.block_count,
            0,
        ];
        for (slot, value) in bytes[8..].chunks_exact_mut(4).zip(fields) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}

/// Streams a container to a writer.
pub struct ContainerWriter<W: Write> {
    writer: W,
    expected_blocks: u32,
    written_blocks: u32,
    bytes_written: u64,
}

impl<W: Write> ContainerWriter<W> {
    /// Write the header and manifest.
    pub fn new(mut writer: W, manifest: &[u8], block_count: u32) -> Result<Self> {
        let header = TraceHeader::new(manifest, block_count);
        let write = |e| TraceError::io("writing header", e);
        writer.write_all(&header.to_bytes()).map_err(write)?;
        writer.write_all(manifest).map_err(write)?;

        Ok(Self {
            writer,
            expected_blocks: block_count,
            written_blocks: 0,
            bytes_written: (HEADER_SIZE + manifest.len()) as u64,
        })
    }

    /// Append one block.
    pub fn write_block(&mut self, bytes: &[u8]) -> Result<()> {
        let write = |e| TraceError::io("writing block", e);
        self.writer
            .write_u32::<LittleEndian>(bytes.len() as u32)
            .map_err(write)?;
        self.writer
            .write_u32::<LittleEndian>(crc32fast::hash(bytes))
            .map_err(write)?;
        self.writer.write_all(bytes).map_err(write)?;

        self.written_blocks += 1;
        self.bytes_written += 8 + bytes.len() as u64;
        Ok(())
    }

    /// Flush and return the total bytes written.
    pub fn finish(mut self) -> Result<u64> {
        if self.written_blocks != self.expected_blocks {
            return Err(TraceError::BlockCount {
                expected: self.expected_blocks,
                found: self.written_blocks,
            });
        }
        self.writer
            .flush()
            .map_err(|e| TraceError::io("flushing trace", e))?;
        Ok(self.bytes_written)
    }
}

/// Reads a container block by block.
pub struct ContainerReader<R: Read> {
    reader: R,
    header: TraceHeader,
    manifest: Vec<u8>,
    blocks_read: u32,
}

impl<R: Read> ContainerReader<R> {
    /// Read and verify the header and manifest.
    pub fn open(mut reader: R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut bytes)
            .map_err(|e| TraceError::io("reading header", e))?;
        let header = TraceHeader::from_bytes(&bytes)?;

        let manifest = read_exact_vec(&mut reader, header.manifest_len, "reading manifest")?;
        if crc32fast::hash(&manifest) != header.manifest_crc {
            return Err(TraceError::CorruptContainer {
                cause: "manifest checksum mismatch".to_string(),
            });
        }

        Ok(Self {
            reader,
            header,
            manifest,
            blocks_read: 0,
        })
    }

    /// The container header.
    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    /// Raw manifest bytes.
    pub fn manifest(&self) -> &[u8] {
        &self.manifest
    }

    /// Read the next block, or `None` after the last one.
    pub fn next_block(&mut self) -> Result<Option<Vec<u8>>> {
        if self.blocks_read >= self.header.block_count {
            return Ok(None);
        }

        let read = |e| TraceError::io("reading block", e);
        let len = self.reader.read_u32::<LittleEndian>().map_err(read)?;
        let crc = self.reader.read_u32::<LittleEndian>().map_err(read)?;
        let bytes = read_exact_vec(&mut self.reader, len, "reading block")?;
        if crc32fast::hash(&bytes) != crc {
            return Err(TraceError::CorruptContainer {
                cause: format!("block {} checksum mismatch", self.blocks_read),
            });
        }

        self.blocks_read += 1;
        Ok(Some(bytes))
    }
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_exact_vec<R: Read>(reader: &mut R, len: u32, context: &'static str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(u64::from(len))
        .read_to_end(&mut bytes)
        .map_err(|e| TraceError::io(context, e))?;
    if bytes.len() != len as usize {
        return Err(TraceError::CorruptContainer {
            cause: format!("truncated while {}", context),
        });
    }
    Ok(bytes)
}
