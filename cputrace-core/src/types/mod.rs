//! Core types for cputrace.
//!
//! - `HistoryEntry`: one retired instruction as seen by the capture side
//! - `PageId` / `PackedRef`: handles into the channel's packed-block arena

mod entry;
mod pointer;

pub use entry::{EA_NONE, EA_RESERVED_FLOOR, HistoryEntry};
pub use pointer::{PackedRef, PageId};
