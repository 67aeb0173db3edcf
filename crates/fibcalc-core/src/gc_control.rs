//! Allocation controller.
//!
//! Large calculations release and re-acquire transform buffers of the same
//! few sizes at every doubling step. While the controller is active the
//! word pool keeps every released buffer instead of handing it back to the
//! system allocator, bounded by a soft ceiling derived from the process's
//! resident memory. Concurrent controllers each hold their own suspension;
//! the pool trims once the last of them ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use tracing::debug;

use fibcalc_memory::WordPool;

use crate::constants::GC_AUTO_THRESHOLD;
use crate::options::GcMode;

/// Retained pool bytes are capped at this multiple of resident memory.
const CEILING_FACTOR: u64 = 3;

/// Counters collected over a controller's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Highest process resident memory sampled at begin/end.
    pub peak_resident_bytes: u64,
    /// Bytes the pool allocated fresh while the controller was active.
    pub total_allocated_bytes: u64,
    /// Trim passes run on `end`.
    pub pause_count: u32,
    /// Wall time spent in those passes.
    pub pause_total: Duration,
}

/// Suspends and restores the word pool's eviction policy.
#[derive(Debug)]
pub struct GcController {
    mode: GcMode,
    n: u64,
    pool: Arc<WordPool>,
    active: bool,
    ceiling: Option<u64>,
    allocated_at_begin: u64,
    stats: GcStats,
}

impl GcController {
    /// Controller over the process-wide pool.
    #[must_use]
    pub fn new(mode: GcMode, n: u64) -> Self {
        Self::with_pool(mode, n, WordPool::global())
    }

    /// Controller over an injected pool.
    #[must_use]
    pub fn with_pool(mode: GcMode, n: u64, pool: Arc<WordPool>) -> Self {
        Self {
            mode,
            n,
            pool,
            active: false,
            ceiling: None,
            allocated_at_begin: 0,
            stats: GcStats::default(),
        }
    }

    /// Whether this mode and index call for suspending eviction.
    #[must_use]
    pub fn should_suspend(&self) -> bool {
        match self.mode {
            GcMode::Auto => self.n >= GC_AUTO_THRESHOLD,
            GcMode::Aggressive => true,
            GcMode::Disabled => false,
        }
    }

    /// Whether eviction is currently suspended by this controller.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Suspend pool eviction if the mode asks for it. Idempotent.
    pub fn begin(&mut self) {
        if self.active || !self.should_suspend() {
            return;
        }

        let resident = resident_bytes();
        self.note_resident(resident);
        let ceiling = resident.map(|r| r.saturating_mul(CEILING_FACTOR));

        self.allocated_at_begin = self.pool.stats().allocated_bytes;
        self.pool.suspend_eviction(ceiling);
        self.ceiling = ceiling;
        self.active = true;
        debug!(mode = %self.mode, n = self.n, ?ceiling, "pool eviction suspended");
    }

    /// Release this controller's suspension. Idempotent.
    ///
    /// The pool is trimmed only when no other controller still holds one.
    pub fn end(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let allocated = self.pool.stats().allocated_bytes;
        self.stats.total_allocated_bytes += allocated.saturating_sub(self.allocated_at_begin);

        self.pool.resume_eviction(self.ceiling.take());
        if self.pool.retains_all() {
            debug!(
                remaining = self.pool.suspensions(),
                "pool eviction still suspended elsewhere"
            );
            return;
        }

        let started = Instant::now();
        let freed = self.pool.trim();
        let pause = started.elapsed();
        self.stats.pause_count += 1;
        self.stats.pause_total += pause;

        self.note_resident(resident_bytes());
        debug!(freed, ?pause, "pool eviction restored");
    }

    /// Suspend now and restore when the guard drops.
    pub fn guard(&mut self) -> GcGuard<'_> {
        self.begin();
        GcGuard { controller: self }
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> GcStats {
        self.stats
    }

    fn note_resident(&mut self, resident: Option<u64>) {
        if let Some(bytes) = resident {
            self.stats.peak_resident_bytes = self.stats.peak_resident_bytes.max(bytes);
        }
    }
}

impl Drop for GcController {
    fn drop(&mut self) {
        self.end();
    }
}

/// Ends the controller on drop, including on early return or unwind.
#[derive(Debug)]
pub struct GcGuard<'a> {
    controller: &'a mut GcController,
}

impl GcGuard<'_> {
    /// Counters of the underlying controller.
    #[must_use]
    pub fn stats(&self) -> GcStats {
        self.controller.stats()
    }
}

impl Drop for GcGuard<'_> {
    fn drop(&mut self) {
        self.controller.end();
    }
}

/// Resident memory of this process, if the platform reports it.
fn resident_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let sys = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new().with_memory()),
    );
    sys.process(pid).map(sysinfo::Process::memory)
}
