//! Save and load options.

use crate::format::Codec;
use crate::history::HistoryConfig;
use std::fmt;
use std::sync::Arc;

/// Default rows per saved block.
pub const DEFAULT_ROW_GROUP_SIZE: u32 = 512 * 1024;

/// Progress callback, called with `(group_index, group_count)` before each
/// row group.
pub type ProgressFn = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Options for [`save_cpu_history`](super::save_cpu_history).
#[derive(Clone)]
pub struct SaveOptions {
    /// Rows per block.
    pub row_group_size: u32,
    /// Block codec.
    pub codec: Codec,
    /// Progress callback.
    pub progress: Option<ProgressFn>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            codec: Codec::Sparse,
            progress: None,
        }
    }
}

impl SaveOptions {
    /// Set rows per block.
    pub fn with_row_group_size(mut self, rows: u32) -> Self {
        self.row_group_size = rows;
        self
    }

    /// Set the block codec.
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the progress callback.
    pub fn with_progress(mut self, progress: impl Fn(u32, u32) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }
}

impl fmt::Debug for SaveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveOptions")
            .field("row_group_size", &self.row_group_size)
            .field("codec", &self.codec)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Options for [`load_cpu_history`](super::load_cpu_history).
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Configuration of the rebuilt channel. The name and tick scale are
    /// replaced by the manifest's.
    pub history: HistoryConfig,
    /// Progress callback.
    pub progress: Option<ProgressFn>,
}

impl LoadOptions {
    /// Set the rebuilt channel's configuration.
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// Set the progress callback.
    pub fn with_progress(mut self, progress: impl Fn(u32, u32) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("history", &self.history)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
