//! Constants for Fibonacci calculation thresholds and configuration.

/// Default threshold (in bits) above which the three doubling products run
/// concurrently.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Default threshold (in bits) for FFT multiplication.
pub const DEFAULT_FFT_THRESHOLD: usize = 500_000;

/// Default threshold (in bits) for Karatsuba ("Strassen-style") multiplication.
pub const DEFAULT_STRASSEN_THRESHOLD: usize = 3072;

/// Default number of FFT recursion levels allowed to fork.
pub const DEFAULT_FFT_PARALLEL_DEPTH: usize = 3;

/// Index from which the `auto` allocation mode suspends pool eviction.
pub const GC_AUTO_THRESHOLD: u64 = 1_000_000;

/// Minimum progress change (1%) before reporting an update.
pub const PROGRESS_REPORT_THRESHOLD: f64 = 0.01;

pub use fibcalc_memory::LOG2_PHI;

/// Maximum Fibonacci index that fits in a u64.
/// F(93) = 12200160415121876738
pub const MAX_FIB_U64: u64 = 93;

/// Largest `k` accepted for last-digit calculations.
pub const MAX_LAST_DIGITS: u32 = 100_000;

/// Precomputed Fibonacci values for n = 0..=93 (fast path).
///
/// F(93) = 12,200,160,415,121,876,738 is the largest Fibonacci number
/// that fits in `u64`. F(94) = 19,740,274,219,868,223,167 overflows
/// `u64::MAX` (18,446,744,073,709,551,615).
pub const FIB_TABLE: [u64; 94] = {
    let mut table = [0u64; 94];
    table[0] = 0;
    table[1] = 1;
    let mut i = 2;
    while i < 94 {
        table[i] = table[i - 1] + table[i - 2];
        i += 1;
    }
    table
};

/// Process exit codes used by the command-line front end.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Generic error.
    pub const ERROR_GENERIC: i32 = 1;
    /// Computation timed out.
    pub const ERROR_TIMEOUT: i32 = 2;
    /// Invalid configuration or input.
    pub const ERROR_CONFIG: i32 = 4;
    /// The computation would exceed the memory limit.
    pub const ERROR_RESOURCE: i32 = 5;
    /// Computation cancelled by user (Ctrl+C).
    pub const ERROR_CANCELED: i32 = 130;
}
