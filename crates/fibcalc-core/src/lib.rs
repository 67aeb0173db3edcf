//! # fibcalc-core
//!
//! Exact Fibonacci numbers for very large indices.
//!
//! The Fast Doubling orchestrator multiplies through a tiered strategy
//! (schoolbook, Karatsuba, FFT) whose thresholds may adapt between steps.
//! A modular variant returns only the last digits. Calculations honour a
//! cancellation/deadline token, report monotonic progress to an observer
//! and are checked against a memory budget before anything is allocated.

pub mod calculator;
pub(crate) mod common;
pub mod constants;
pub mod dynamic_threshold;
pub mod fastdoubling;
pub mod gc_control;
pub mod memory_budget;
pub mod modular;
pub mod observer;
pub mod observers;
pub mod options;
pub mod progress;
pub mod strategy;
pub mod threshold_types;

pub use calculator::{table_lookup, Calculator, CoreCalculator, FibCalculator, FibError};
pub use constants::{
    exit_codes, DEFAULT_FFT_THRESHOLD, DEFAULT_PARALLEL_THRESHOLD, DEFAULT_STRASSEN_THRESHOLD,
    FIB_TABLE, MAX_FIB_U64, MAX_LAST_DIGITS, PROGRESS_REPORT_THRESHOLD,
};
pub use fastdoubling::FastDoubling;
pub use gc_control::{GcController, GcGuard, GcStats};
pub use memory_budget::{format_bytes, parse_memory_limit, MemoryEstimate};
pub use modular::{fibonacci_mod, LastDigits};
pub use observer::{FrozenObserver, ProgressObserver, ProgressSubject};
pub use observers::{ChannelObserver, FnObserver, LoggingObserver, NoOpObserver};
pub use options::{GcMode, Options, TransformCacheConfig};
pub use progress::{CancellationToken, ProgressUpdate};
pub use strategy::{MulTier, Multiplier, Thresholds, TieredMultiplier};

use std::sync::Arc;

use num_bigint::BigUint;

/// Compute F(n) with the given options.
///
/// # Errors
///
/// `ResourceExhausted` when the pre-flight estimate exceeds
/// `opts.memory_limit_bytes`; `Cancelled`/`Timeout` from `cancel`.
///
/// # Example
/// ```
/// use fibcalc_core::{calculate, CancellationToken, NoOpObserver, Options};
///
/// let f = calculate(100, &Options::default(), &CancellationToken::new(), &NoOpObserver::new());
/// assert_eq!(f.unwrap().to_string(), "354224848179261915075");
/// ```
pub fn calculate(
    n: u64,
    opts: &Options,
    cancel: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<BigUint, FibError> {
    FastDoubling::with_options(opts.clone()).calculate(n, cancel, observer)
}

/// The last `k` decimal digits of F(n), as a number below `10^k`.
///
/// Memory stays proportional to `k` whatever `n` is.
///
/// # Errors
///
/// `InvalidInput` when `k` exceeds [`MAX_LAST_DIGITS`];
/// `Cancelled`/`Timeout` from `cancel`.
pub fn calculate_last_digits(
    n: u64,
    k: u32,
    cancel: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<BigUint, FibError> {
    modular::calculate_last_digits(n, k, cancel, observer)
}

/// Boxed calculator for `opts`: Fast Doubling behind the table fast path.
#[must_use]
pub fn calculator(opts: &Options) -> FibCalculator {
    FibCalculator::new(Arc::new(FastDoubling::with_options(opts.clone())))
}

/// Compute F(n) with default options, no deadline and no progress.
///
/// # Example
/// ```
/// assert_eq!(fibcalc_core::fibonacci(10).to_string(), "55");
/// assert_eq!(fibcalc_core::fibonacci(0).to_string(), "0");
/// ```
///
/// # Panics
///
/// Only on an internal arithmetic fault, which no input can trigger.
#[must_use]
pub fn fibonacci(n: u64) -> BigUint {
    let cancel = CancellationToken::new();
    calculator(&Options::default())
        .calculate(&cancel, &NoOpObserver::new(), n)
        .expect("unbounded calculation without a deadline cannot fail")
}
