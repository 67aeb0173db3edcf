//! # fibcalc-memory
//!
//! Memory management for the `FibCalc` workspace.
//!
//! Provides the word-level storage contract shared by the arithmetic
//! kernels, a pre-sized bump arena for the numbers of one calculation, and
//! a size-classed pool of word buffers for transform temporaries.
#![warn(missing_docs)]

pub mod arena;
pub mod pool;
pub mod stats;
pub mod words;

pub use arena::{ArenaBuf, BumpRegion, CalculationArena};
pub use pool::{PoolConfig, WordPool};
pub use stats::PoolStats;
pub use words::{Nat, Word, WordBuf, LOG2_PHI, WORD_BITS};
