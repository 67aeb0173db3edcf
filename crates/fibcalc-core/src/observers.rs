//! Concrete observer implementations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::constants::PROGRESS_REPORT_THRESHOLD;
use crate::observer::{FrozenObserver, ProgressObserver};
use crate::progress::ProgressUpdate;

/// Observer that sends updates through a channel without blocking.
pub struct ChannelObserver {
    sender: Sender<ProgressUpdate>,
    last_reported: AtomicU64,
}

impl ChannelObserver {
    /// Create a new channel observer.
    #[must_use]
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        Self {
            sender,
            last_reported: AtomicU64::new(0f64.to_bits()),
        }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        let last = f64::from_bits(self.last_reported.load(Ordering::Relaxed));
        if update.done || (update.progress - last) >= PROGRESS_REPORT_THRESHOLD {
            // A full channel drops the update rather than stalling the loop.
            let _ = self.sender.try_send(update.clone());
            self.last_reported
                .store(update.progress.to_bits(), Ordering::Relaxed);
        }
    }

    fn freeze(&self) -> FrozenObserver {
        FrozenObserver::new(PROGRESS_REPORT_THRESHOLD)
    }
}

/// Observer that logs progress through `tracing`, throttled in time.
pub struct LoggingObserver {
    started: Instant,
    min_interval_ms: u64,
    last_time_ms: AtomicU64,
    logged: AtomicU64,
}

impl LoggingObserver {
    /// Create a new logging observer with the given minimum interval.
    #[must_use]
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            started: Instant::now(),
            min_interval_ms,
            last_time_ms: AtomicU64::new(0),
            logged: AtomicU64::new(0),
        }
    }

    /// Number of updates that made it to the log.
    #[must_use]
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }
}

impl ProgressObserver for LoggingObserver {
    #[allow(clippy::cast_possible_truncation)]
    fn on_progress(&self, update: &ProgressUpdate) {
        let now = self.started.elapsed().as_millis() as u64;
        let last = self.last_time_ms.load(Ordering::Relaxed);
        let first = self.logged.load(Ordering::Relaxed) == 0;
        if !update.done && !first && now.saturating_sub(last) < self.min_interval_ms {
            return;
        }

        if update.done {
            info!(algorithm = %update.algorithm, "calculation complete");
        } else {
            debug!(
                algorithm = %update.algorithm,
                progress = format!("{:.1}%", update.progress * 100.0),
                step = update.current_step,
                total = update.total_steps,
                "progress update"
            );
        }
        self.last_time_ms.store(now, Ordering::Relaxed);
        self.logged.fetch_add(1, Ordering::Relaxed);
    }

    fn freeze(&self) -> FrozenObserver {
        FrozenObserver::new(PROGRESS_REPORT_THRESHOLD)
    }
}

/// Adapts a closure taking the progress fraction into an observer.
pub struct FnObserver<F> {
    callback: F,
    threshold: f64,
}

impl<F> FnObserver<F>
where
    F: Fn(f64) + Send + Sync,
{
    /// Wrap `callback`, reporting every 1% of progress.
    pub fn new(callback: F) -> Self {
        Self::with_threshold(callback, PROGRESS_REPORT_THRESHOLD)
    }

    /// Wrap `callback` with a custom reporting granularity.
    pub fn with_threshold(callback: F, threshold: f64) -> Self {
        Self {
            callback,
            threshold,
        }
    }
}

impl<F> ProgressObserver for FnObserver<F>
where
    F: Fn(f64) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        (self.callback)(update.progress);
    }

    fn freeze(&self) -> FrozenObserver {
        FrozenObserver::new(self.threshold)
    }
}

/// Null object: discards every update.
pub struct NoOpObserver;

impl NoOpObserver {
    /// Create a new no-op observer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for NoOpObserver {
    fn on_progress(&self, _update: &ProgressUpdate) {}

    fn freeze(&self) -> FrozenObserver {
        FrozenObserver::new(1.0)
    }
}
