//! Error types for cputrace.
//!
//! Every failure belongs to one of three classes the caller must be able to
//! tell apart:
//!
//! - **Invalid**: the data contradicts itself (overlapping columns, truncated
//!   streams, bad checksums). The file is corrupt.
//! - **Unsupported**: the data is well formed but names a feature this build
//!   does not implement. The file probably came from a newer build.
//! - **Resource**: background packing failed or the arena ran out of room.
//!
//! I/O failures are reported separately so that a missing file is not
//! confused with a corrupt one.

use thiserror::Error;

/// Broad classification of a [`TraceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Self-contradictory data.
    Invalid,
    /// Well-formed data referencing something this build cannot handle.
    Unsupported,
    /// Capture-side resource failure.
    Resource,
    /// Underlying reader/writer failure.
    Io,
}

/// The main error type for trace capture and trace file operations.
#[derive(Error, Debug)]
pub enum TraceError {
    // =========================================================================
    // Invalid Data (E001-E099)
    // =========================================================================
    /// Row geometry is self-contradictory (zero width, zero group size).
    #[error("E001: Invalid row geometry: {cause}")]
    RowGeometry {
        /// Reason the geometry was rejected.
        cause: String,
    },

    /// A column in a row schema is malformed.
    #[error("E002: Invalid column {index}: {cause}")]
    ColumnLayout {
        /// Position of the column in the schema.
        index: usize,
        /// Reason the column was rejected.
        cause: String,
    },

    /// A predictor's configuration violates one of its preconditions.
    #[error("E003: Invalid {predictor} predictor configuration: {cause}")]
    PredictorConfig {
        /// Persisted type name of the predictor.
        predictor: &'static str,
        /// Reason the configuration was rejected.
        cause: String,
    },

    /// A predictor touches bytes outside the row.
    #[error("E004: Byte range {offset}+{len} exceeds row size {row_size}")]
    PredictorRange {
        /// First byte accessed.
        offset: u32,
        /// Number of bytes accessed.
        len: u32,
        /// Width of the row in bytes.
        row_size: u32,
    },

    /// A codec stream ended early or carried bytes it should not have.
    #[error("E005: Corrupt {codec} stream: {cause}")]
    CorruptStream {
        /// Codec type name.
        codec: &'static str,
        /// What was wrong with the stream.
        cause: String,
    },

    /// The number of stored blocks does not match the row count.
    #[error("E006: Block count mismatch: expected {expected}, found {found}")]
    BlockCount {
        /// Blocks implied by row count and group size.
        expected: u32,
        /// Blocks present in the file.
        found: u32,
    },

    /// The trace file container is damaged.
    #[error("E007: Corrupt trace container: {cause}")]
    CorruptContainer {
        /// What was wrong with the container.
        cause: String,
    },

    /// The manifest could not be decoded.
    #[error("E008: Invalid trace manifest: {cause}")]
    Manifest {
        /// Decoder message.
        cause: String,
    },

    /// A history source produced fewer rows than it reported.
    #[error("E009: Unexpected end of stream while reading {what}")]
    UnexpectedEof {
        /// The stream being read.
        what: &'static str,
    },

    /// A packed-block handle does not point inside the arena.
    #[error("E010: Invalid packed block reference {reference}: {cause}")]
    PackedRef {
        /// The handle, formatted.
        reference: String,
        /// Why it was rejected.
        cause: String,
    },

    // =========================================================================
    // Unsupported Features (E100-E199)
    // =========================================================================
    /// A type name is not known to this build.
    #[error("E101: Unsupported {kind} type '{name}'")]
    UnsupportedType {
        /// Category of the type ("predictor", "codec", "column").
        kind: &'static str,
        /// The unrecognized type name.
        name: String,
    },

    /// The geometry is valid but exceeds what this build implements.
    #[error("E102: Unsupported trace geometry: {cause}")]
    UnsupportedGeometry {
        /// Which limit was exceeded.
        cause: String,
    },

    /// The container was written by a newer format version.
    #[error("E103: Unsupported trace format version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version recorded in the file.
        found: u32,
        /// Highest version this build reads.
        supported: u32,
    },

    /// The channel does not declare a codec.
    #[error("E104: Trace channel has no codec")]
    MissingCodec,

    /// A codec was asked to encode rows wider than it supports.
    #[error("E105: Cannot encode trace stripe: unsupported row geometry ({row_size} bytes for {codec})")]
    EncodeGeometry {
        /// Codec type name.
        codec: &'static str,
        /// Width of the rows.
        row_size: u32,
    },

    // =========================================================================
    // Resource Errors (E200-E299)
    // =========================================================================
    /// The packed-block arena hit its configured byte limit.
    #[error("E201: Packed arena exhausted: requested {requested} bytes, limit {limit} bytes")]
    ArenaExhausted {
        /// Bytes requested by the failed allocation.
        requested: u64,
        /// Configured limit.
        limit: u64,
    },

    /// A background packing task failed.
    #[error("E202: Packing worker failed on chunk {chunk}: {cause}")]
    WorkerFailed {
        /// Sequence number of the chunk being packed.
        chunk: u32,
        /// Panic message or error text.
        cause: String,
    },

    /// Capture was disabled by an earlier failure.
    #[error("E203: Trace corrupted, capture disabled: {cause}")]
    CaptureFaulted {
        /// The failure that disabled capture.
        cause: String,
    },

    /// The packing thread pool could not be created.
    #[error("E204: Failed to start packing workers: {cause}")]
    ThreadPool {
        /// Builder error text.
        cause: String,
    },

    // =========================================================================
    // I/O Errors (E900-E999)
    // =========================================================================
    /// Reading or writing the trace file failed.
    #[error("E901: I/O error while {context}: {cause}")]
    Io {
        /// What was being done.
        context: &'static str,
        /// Underlying error text.
        cause: String,
    },

    /// The manifest could not be serialized.
    #[error("E902: Serialization error: {0}")]
    Serialization(String),
}

impl TraceError {
    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RowGeometry { .. } => "E001",
            Self::ColumnLayout { .. } => "E002",
            Self::PredictorConfig { .. } => "E003",
            Self::PredictorRange { .. } => "E004",
            Self::CorruptStream { .. } => "E005",
            Self::BlockCount { .. } => "E006",
            Self::CorruptContainer { .. } => "E007",
            Self::Manifest { .. } => "E008",
            Self::UnexpectedEof { .. } => "E009",
            Self::PackedRef { .. } => "E010",
            Self::UnsupportedType { .. } => "E101",
            Self::UnsupportedGeometry { .. } => "E102",
            Self::UnsupportedVersion { .. } => "E103",
            Self::MissingCodec => "E104",
            Self::EncodeGeometry { .. } => "E105",
            Self::ArenaExhausted { .. } => "E201",
            Self::WorkerFailed { .. } => "E202",
            Self::CaptureFaulted { .. } => "E203",
            Self::ThreadPool { .. } => "E204",
            Self::Io { .. } => "E901",
            Self::Serialization(_) => "E902",
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RowGeometry { .. }
            | Self::ColumnLayout { .. }
            | Self::PredictorConfig { .. }
            | Self::PredictorRange { .. }
            | Self::CorruptStream { .. }
            | Self::BlockCount { .. }
            | Self::CorruptContainer { .. }
            | Self::Manifest { .. }
            | Self::UnexpectedEof { .. }
            | Self::PackedRef { .. } => ErrorKind::Invalid,
            Self::UnsupportedType { .. }
            | Self::UnsupportedGeometry { .. }
            | Self::UnsupportedVersion { .. }
            | Self::MissingCodec
            | Self::EncodeGeometry { .. } => ErrorKind::Unsupported,
            Self::ArenaExhausted { .. }
            | Self::WorkerFailed { .. }
            | Self::CaptureFaulted { .. }
            | Self::ThreadPool { .. } => ErrorKind::Resource,
            Self::Io { .. } | Self::Serialization(_) => ErrorKind::Io,
        }
    }

    /// Check if this error means the data is corrupt.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.kind() == ErrorKind::Invalid
    }

    /// Check if this error means the data needs a newer build.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.kind() == ErrorKind::Unsupported
    }

    pub(crate) fn predictor(predictor: &'static str, cause: impl Into<String>) -> Self {
        Self::PredictorConfig {
            predictor,
            cause: cause.into(),
        }
    }

    pub(crate) fn io(context: &'static str, err: std::io::Error) -> Self {
        // A short read inside the container is truncation, not an I/O fault.
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::CorruptContainer {
                cause: format!("truncated while {}", context),
            }
        } else {
            Self::Io {
                context,
                cause: err.to_string(),
            }
        }
    }
}

/// Result type alias using `TraceError`.
pub type Result<T> = std::result::Result<T, TraceError>;
