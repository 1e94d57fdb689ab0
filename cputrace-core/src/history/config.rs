//! Capture channel configuration.

use crate::arena::ArenaConfig;

/// Default number of packing threads per channel.
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Configuration for a [`CpuHistoryChannel`](super::CpuHistoryChannel).
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryConfig {
    /// Tick at which the trace starts. Its low 32 bits are the history base
    /// cycle.
    pub tick_offset: u64,
    /// Seconds per tick.
    pub tick_scale: f64,
    /// Channel name written to the manifest.
    pub name: String,
    /// Pack closed chunks on worker threads instead of at retirement.
    pub async_packing: bool,
    /// Packing threads; zero picks the default.
    pub worker_threads: usize,
    /// Storage for packed blocks.
    pub arena: ArenaConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            tick_offset: 0,
            tick_scale: 1.0 / 1_789_772.5,
            name: "CPU".to_string(),
            async_packing: true,
            worker_threads: DEFAULT_WORKER_THREADS,
            arena: ArenaConfig::default(),
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the starting tick.
    pub fn with_tick_offset(mut self, tick_offset: u64) -> Self {
        self.tick_offset = tick_offset;
        self
    }

    /// Set seconds per tick.
    pub fn with_tick_scale(mut self, tick_scale: f64) -> Self {
        self.tick_scale = tick_scale;
        self
    }

    /// Set the channel name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable background packing.
    pub fn with_async_packing(mut self, enabled: bool) -> Self {
        self.async_packing = enabled;
        self
    }

    /// Set the number of packing threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the arena configuration.
    pub fn with_arena(mut self, arena: ArenaConfig) -> Self {
        self.arena = arena;
        self
    }

    /// Low 32 bits of the starting tick.
    #[must_use]
    pub fn history_base_cycle(&self) -> u32 {
        self.tick_offset as u32
    }

    pub(crate) fn effective_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            DEFAULT_WORKER_THREADS
        } else {
            self.worker_threads
        }
    }
}
