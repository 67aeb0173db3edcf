//! Calculator traits, the error type and the `FibCalculator` decorator.
//!
//! `Calculator` is the public trait consumed by collaborators.
//! `CoreCalculator` is the internal trait implemented by algorithms.
//! `FibCalculator` is a decorator that adds the fast path (n <= 93) and the
//! completion update.

use std::sync::Arc;

use num_bigint::BigUint;

use fibcalc_bigfft::FftError;

use crate::constants::{exit_codes, FIB_TABLE, MAX_FIB_U64};
use crate::observer::ProgressObserver;
use crate::progress::{CancellationToken, ProgressUpdate};

/// Error type for Fibonacci calculations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FibError {
    /// The request itself is invalid (e.g. a non-positive modulus).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Calculation was cancelled.
    #[error("calculation cancelled")]
    Cancelled,

    /// The deadline passed before the calculation finished.
    #[error("calculation timed out after {0}")]
    Timeout(String),

    /// The pre-flight estimate exceeds the memory limit.
    #[error("memory limit exceeded: {required} bytes required, limit is {limit} bytes")]
    ResourceExhausted {
        /// Estimated peak bytes.
        required: u64,
        /// Configured limit in bytes.
        limit: u64,
    },

    /// A ring or transform invariant failed; never caused by user input.
    #[error("internal arithmetic fault: {0}")]
    InternalArithmeticFault(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FibError {
    /// Whether the calculation stopped because it was asked to.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => exit_codes::ERROR_CANCELED,
            Self::Timeout(_) => exit_codes::ERROR_TIMEOUT,
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::ERROR_CONFIG,
            Self::ResourceExhausted { .. } => exit_codes::ERROR_RESOURCE,
            Self::InternalArithmeticFault(_) => exit_codes::ERROR_GENERIC,
        }
    }
}

impl From<FftError> for FibError {
    fn from(err: FftError) -> Self {
        Self::InternalArithmeticFault(err.to_string())
    }
}

/// Public trait for Fibonacci calculators.
pub trait Calculator: Send + Sync {
    /// Calculate F(n).
    fn calculate(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        n: u64,
    ) -> Result<BigUint, FibError>;

    /// Get the name of this calculator.
    fn name(&self) -> &'static str;
}

/// Internal trait for algorithm implementations.
/// Wrapped by `FibCalculator` which adds the fast path and completion.
pub trait CoreCalculator: Send + Sync {
    /// Perform the core calculation for n > 93.
    fn calculate_core(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        n: u64,
    ) -> Result<BigUint, FibError>;

    /// Get the name of this algorithm.
    fn name(&self) -> &'static str;
}

/// Decorator that wraps a `CoreCalculator` with fast path and progress reporting.
pub struct FibCalculator {
    inner: Arc<dyn CoreCalculator>,
}

impl FibCalculator {
    /// Create a new `FibCalculator` wrapping the given core calculator.
    #[must_use]
    pub fn new(inner: Arc<dyn CoreCalculator>) -> Self {
        Self { inner }
    }
}

/// F(n) from the precomputed table, for n <= 93.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn table_lookup(n: u64) -> Option<BigUint> {
    (n <= MAX_FIB_U64).then(|| BigUint::from(FIB_TABLE[n as usize]))
}

/// Table lookup for small n, otherwise the core algorithm; both paths end
/// with a completion update.
pub(crate) fn calculate_with_fast_path(
    core: &dyn CoreCalculator,
    cancel: &CancellationToken,
    observer: &dyn ProgressObserver,
    n: u64,
) -> Result<BigUint, FibError> {
    if let Some(value) = table_lookup(n) {
        observer.on_progress(&ProgressUpdate::done(core.name()));
        return Ok(value);
    }

    cancel.check()?;

    let result = core.calculate_core(cancel, observer, n)?;
    observer.on_progress(&ProgressUpdate::done(core.name()));
    Ok(result)
}

impl Calculator for FibCalculator {
    fn calculate(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        n: u64,
    ) -> Result<BigUint, FibError> {
        calculate_with_fast_path(self.inner.as_ref(), cancel, observer, n)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
