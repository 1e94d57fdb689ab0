//! Byte codecs applied to rows after prediction.
//!
//! A codec turns a buffer of residual rows into a block payload and back. The
//! closed set of codecs is named in manifests by [`Codec`]'s `type` tag.

mod null;
mod simd;
mod sparse;

pub use null::NullCodec;
pub use sparse::{MAX_SPARSE_ROW_SIZE, SparseCodec};

use crate::error::{Result, TraceError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row codec.
pub trait RowCodec {
    /// Persisted type name.
    const NAME: &'static str;

    /// Check that rows of `row_size` bytes can be coded.
    fn validate(&self, row_size: u32) -> Result<()>;

    /// Append the encoding of `rows` to `out`.
    fn encode(&self, rows: &[u8], row_size: usize, out: &mut Vec<u8>) -> Result<()>;

    /// Decode `input` into `out`, which holds exactly the expected rows.
    fn decode(&self, input: &[u8], row_size: usize, out: &mut [u8]) -> Result<()>;
}

/// Any codec kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Codec {
    /// Non-zero mask followed by the non-zero bytes.
    #[default]
    Sparse,
    /// Raw copy.
    Null,
}

impl Codec {
    /// Type names that may appear in a manifest.
    pub const PERSISTED_NAMES: &'static [&'static str] = &[SparseCodec::NAME, NullCodec::NAME];

    /// Type name of this codec.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sparse => SparseCodec::NAME,
            Self::Null => NullCodec::NAME,
        }
    }

    /// Check that rows of `row_size` bytes can be coded.
    pub fn validate(&self, row_size: u32) -> Result<()> {
        match self {
            Self::Sparse => SparseCodec.validate(row_size),
            Self::Null => NullCodec.validate(row_size),
        }
    }

    /// Append the encoding of `rows` to `out`.
    pub fn encode(&self, rows: &[u8], row_size: usize, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Sparse => SparseCodec.encode(rows, row_size, out),
            Self::Null => NullCodec.encode(rows, row_size, out),
        }
    }

    /// Fewest bytes an encoding of `rows` rows of `row_size` bytes can take.
    ///
    /// `None` when the size does not fit in `usize`.
    #[must_use]
    pub fn min_encoded_len(&self, rows: usize, row_size: usize) -> Option<usize> {
        match self {
            Self::Sparse => rows.checked_mul(row_size.div_ceil(8)),
            Self::Null => rows.checked_mul(row_size),
        }
    }

    /// Check that an encoded block of `len` bytes can hold `rows` rows.
    pub fn check_encoded_len(&self, len: usize, rows: usize, row_size: usize) -> Result<()> {
        let fits = match (self, self.min_encoded_len(rows, row_size)) {
            (_, None) => false,
            (Self::Sparse, Some(min)) => len >= min,
            (Self::Null, Some(exact)) => len == exact,
        };
        if fits {
            Ok(())
        } else {
            Err(TraceError::CorruptStream {
                codec: self.name(),
                cause: format!(
                    "{} bytes cannot hold {} rows of {} bytes",
                    len, rows, row_size
                ),
            })
        }
    }

    /// Decode `input` into `out`.
    pub fn decode(&self, input: &[u8], row_size: usize, out: &mut [u8]) -> Result<()> {
        match self {
            Self::Sparse => SparseCodec.decode(input, row_size, out),
            Self::Null => NullCodec.decode(input, row_size, out),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
