//! # fibcalc-bigfft
//!
//! Big natural multiplication for the `FibCalc` workspace: portable limb
//! arithmetic, schoolbook and Karatsuba products, and a Schönhage–Strassen
//! multiplier over the Fermat rings `Z/(2^(64n)+1)` with a shared transform
//! cache and bounded parallel recursion.

pub mod allocator;
pub mod arith;
pub mod error;
pub mod fermat;
pub mod fft;
pub mod fft_cache;
pub mod fft_core;
pub mod fft_poly;
pub mod fft_recursion;
pub mod memory_est;
pub mod nat;
pub mod pool_warming;

pub use allocator::{PoolAllocator, SimpleAllocator, TempAllocator};
pub use error::FftError;
pub use fft::{mul, mul_to, sqr, sqr_to, FftConfig, FftEngine, FftStats};
pub use fft_cache::{CacheConfig, CacheStats, TransformCache};
pub use fft_recursion::TaskSemaphore;
