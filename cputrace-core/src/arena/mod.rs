//! Paged, append-only storage for packed history blocks.
//!
//! Every capture channel owns one arena. Background workers append packed
//! blocks; the capture thread and readers resolve [`PackedRef`] handles back
//! into bytes. Nothing is ever removed, so a handle stays valid for the life
//! of the arena.
//!
//! # Layout
//!
//! ```text
//! ┌───────────────────────────────┐
//! │ page 0: [block][block][block] │  page_size bytes reserved up front
//! ├───────────────────────────────┤
//! │ page 1: [block][block]...     │
//! ├───────────────────────────────┤
//! │ page 2: [oversized block]     │  sized to fit when a block exceeds page_size
//! └───────────────────────────────┘
//! ```
//!
//! A block never spans pages. Appends take the write lock only for the byte
//! copy; reads take the read lock only for the duration of a closure.
//!
//! [`PackedRef`]: crate::types::PackedRef

mod config;
mod pages;

pub use config::{ArenaConfig, DEFAULT_BYTE_LIMIT, DEFAULT_PAGE_SIZE};
pub use pages::{ArenaStats, PackedArena};
