//! Arena sizing.

/// Default page size: 1 MB.
pub const DEFAULT_PAGE_SIZE: u32 = 1024 * 1024;

/// Default byte limit: 4 GB.
pub const DEFAULT_BYTE_LIMIT: u64 = 4 * 1024 * 1024 * 1024;

/// Configuration for arena creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Bytes reserved per page.
    pub page_size: u32,
    /// Total packed bytes the arena will hold before refusing appends.
    pub byte_limit: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            byte_limit: DEFAULT_BYTE_LIMIT,
        }
    }
}

impl ArenaConfig {
    /// Small pages and a tight limit for tests.
    pub fn small() -> Self {
        Self {
            page_size: 4 * 1024,
            byte_limit: 16 * 1024 * 1024,
        }
    }

    /// Set the page size. Zero is raised to one byte.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the byte limit.
    pub fn with_byte_limit(mut self, byte_limit: u64) -> Self {
        self.byte_limit = byte_limit;
        self
    }
}
