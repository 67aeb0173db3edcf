//! Progress updates and the cooperative cancellation handle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::calculator::FibError;

/// Progress update sent from calculators to observers.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Name of the algorithm producing this update.
    pub algorithm: &'static str,
    /// Current progress as a fraction in [0.0, 1.0].
    pub progress: f64,
    /// Bits of n processed so far.
    pub current_step: u64,
    /// Total bits of n.
    pub total_steps: u64,
    /// Whether this is the final update.
    pub done: bool,
}

impl ProgressUpdate {
    /// Create a new progress update.
    #[must_use]
    pub fn new(algorithm: &'static str, progress: f64, current: u64, total: u64) -> Self {
        Self {
            algorithm,
            progress,
            current_step: current,
            total_steps: total,
            done: false,
        }
    }

    /// Create a completion update.
    #[must_use]
    pub fn done(algorithm: &'static str) -> Self {
        Self {
            algorithm,
            progress: 1.0,
            current_step: 0,
            total_steps: 0,
            done: true,
        }
    }
}

/// Fraction of the doubling loop completed after `step` of `total` bits.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn step_fraction(step: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (step as f64 / total as f64).clamp(0.0, 1.0)
}

struct TokenState {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    checkpoints: AtomicU64,
}

/// Cooperative cancellation handle with an optional deadline.
///
/// Clones share state: cancelling one clone cancels all of them. The
/// calculation polls the token between doubling steps and between the three
/// products of a step; a transform that has started always runs to the end.
///
/// # Example
/// ```
/// use fibcalc_core::progress::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(token.check().is_ok());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// assert!(token.check().is_err());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Create a token with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a token that expires `timeout` from now.
    #[must_use]
    pub fn with_deadline(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                deadline: timeout.map(|t| Instant::now() + t),
                timeout,
                checkpoints: AtomicU64::new(0),
            }),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested or the deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire) || self.expired()
    }

    fn expired(&self) -> bool {
        self.state.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Checkpoint: `Cancelled` after `cancel()`, `Timeout` once the
    /// deadline has passed. Every call is counted.
    pub fn check(&self) -> Result<(), FibError> {
        self.state.checkpoints.fetch_add(1, Ordering::Relaxed);
        if self.state.cancelled.load(Ordering::Acquire) {
            return Err(FibError::Cancelled);
        }
        if self.expired() {
            let timeout = self.state.timeout.unwrap_or_default();
            return Err(FibError::Timeout(format!("{timeout:?}")));
        }
        Ok(())
    }

    /// Number of checkpoints evaluated so far, across all clones.
    #[must_use]
    pub fn checkpoints(&self) -> u64 {
        self.state.checkpoints.load(Ordering::Relaxed)
    }

    /// Time left before the deadline, `None` without one.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.state
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.state.cancelled.load(Ordering::Relaxed))
            .field("timeout", &self.state.timeout)
            .field("checkpoints", &self.checkpoints())
            .finish()
    }
}
