//! Observer pattern for progress tracking.
//!
//! Calculators report through a `FrozenObserver` gate: a lock-free snapshot
//! that only lets an update through once progress has moved by at least the
//! reporting threshold, and never lets progress go backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::progress::ProgressUpdate;

/// Observer trait for receiving progress updates.
pub trait ProgressObserver: Send + Sync {
    /// Receive a progress update.
    fn on_progress(&self, update: &ProgressUpdate);

    /// Create a frozen snapshot for lock-free access in hot loops.
    fn freeze(&self) -> FrozenObserver;
}

/// A frozen observer that can be used in hot loops without locks.
///
/// Stores the last reported progress as atomic bits.
#[derive(Clone)]
pub struct FrozenObserver {
    progress: Arc<AtomicU64>,
    threshold: f64,
}

impl FrozenObserver {
    /// Create a new frozen observer with the given reporting threshold.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            progress: Arc::new(AtomicU64::new(0f64.to_bits())),
            threshold,
        }
    }

    /// Check if progress has changed enough to warrant reporting.
    #[inline]
    #[must_use]
    pub fn should_report(&self, new_progress: f64) -> bool {
        (new_progress - self.current()) >= self.threshold
    }

    /// Update the stored progress value. Lower values are ignored.
    pub fn update(&self, new_progress: f64) {
        let _ = self
            .progress
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                (new_progress > f64::from_bits(bits)).then_some(new_progress.to_bits())
            });
    }

    /// Get the current progress value.
    #[must_use]
    pub fn current(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    /// Forward `update` to `observer` if it passes the gate.
    pub fn report(&self, observer: &dyn ProgressObserver, update: &ProgressUpdate) {
        if update.done || self.should_report(update.progress) {
            self.update(update.progress);
            observer.on_progress(update);
        }
    }
}

/// Subject that fans updates out to a collection of observers.
pub struct ProgressSubject {
    observers: RwLock<Vec<Arc<dyn ProgressObserver>>>,
}

impl ProgressSubject {
    /// Create a new subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer.
    pub fn register(&self, observer: Arc<dyn ProgressObserver>) {
        self.observers.write().push(observer);
    }

    /// Unregister all observers.
    pub fn clear(&self) {
        self.observers.write().clear();
    }

    /// Get the number of registered observers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for ProgressSubject {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressSubject {
    fn on_progress(&self, update: &ProgressUpdate) {
        for observer in self.observers.read().iter() {
            observer.on_progress(update);
        }
    }

    fn freeze(&self) -> FrozenObserver {
        let threshold = self
            .observers
            .read()
            .iter()
            .map(|o| o.freeze().threshold)
            .fold(1.0f64, f64::min);
        FrozenObserver::new(threshold)
    }
}
