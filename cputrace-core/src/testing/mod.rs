//! Deterministic history sources for tests, benchmarks, and demos.
//!
//! [`SyntheticCpu`] executes a randomly generated but fixed 6502-like
//! program and yields one `(tick, HistoryEntry)` per instruction. The same
//! seed always produces the same stream.
//!
//! # Example
//!
//! ```
//! use cputrace_core::testing::SyntheticCpu;
//!
//! let a: Vec<_> = SyntheticCpu::new(7).take(100).collect();
//! let b: Vec<_> = SyntheticCpu::new(7).take(100).collect();
//! assert_eq!(a, b);
//! ```

mod synthetic;

pub use synthetic::{PROGRAM_BASE, PROGRAM_LEN, SyntheticCpu};
