//! Word-buffer pool with power-of-4 size classes.
//!
//! Buffers are bucketed by capacity. A buffer served for a request of `w`
//! words always has capacity of at least `w`; a released buffer lands in the
//! largest class not exceeding its capacity, so every buffer in a class can
//! serve any request routed to that class.
//!
//! Eviction can be suspended by several holders at once. Each suspension may
//! carry a byte ceiling; the tightest active ceiling applies, and the normal
//! per-class cap comes back only when the last holder resumes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::stats::{AtomicPoolStats, PoolStats};
use crate::words::Word;

/// Smallest size class in words.
pub const MIN_CLASS_WORDS: usize = 64;

/// Default cap on buffer size accepted back into the pool (100M bits).
pub const DEFAULT_MAX_POOLED_WORDS: usize = 100_000_000 / 64;

/// Default number of free buffers kept per class.
pub const DEFAULT_MAX_PER_CLASS: usize = 32;

const WORD_BYTES: u64 = std::mem::size_of::<Word>() as u64;

/// Pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Buffers with a larger capacity are dropped on release.
    pub max_pooled_words: usize,
    /// Free buffers kept per class under the normal retention policy.
    pub max_per_class: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pooled_words: DEFAULT_MAX_POOLED_WORDS,
            max_per_class: DEFAULT_MAX_PER_CLASS,
        }
    }
}

/// Shared pool of `Vec<Word>` buffers, safe to use from many threads.
pub struct WordPool {
    classes: Mutex<HashMap<usize, Vec<Vec<Word>>>>,
    config: PoolConfig,
    ceilings: Mutex<Vec<u64>>,
    suspensions: AtomicUsize,
    retained_ceiling: AtomicU64,
    stats: AtomicPoolStats,
}

impl WordPool {
    /// Create a pool with the given limits.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            classes: Mutex::new(HashMap::new()),
            config,
            ceilings: Mutex::new(Vec::new()),
            suspensions: AtomicUsize::new(0),
            retained_ceiling: AtomicU64::new(u64::MAX),
            stats: AtomicPoolStats::new(),
        }
    }

    /// The process-wide pool.
    pub fn global() -> Arc<WordPool> {
        static GLOBAL: OnceLock<Arc<WordPool>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(WordPool::default())))
    }

    /// Limits this pool was built with.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Acquire a zero-filled buffer of exactly `words` words.
    pub fn acquire(&self, words: usize) -> Vec<Word> {
        let mut buf = self.take(words);
        buf.clear();
        buf.resize(words, 0);
        buf
    }

    /// Acquire a buffer of `words` words whose contents are unspecified.
    ///
    /// Only words past the buffer's previous length are zeroed.
    pub fn acquire_raw(&self, words: usize) -> Vec<Word> {
        let mut buf = self.take(words);
        buf.resize(words, 0);
        buf
    }

    fn take(&self, words: usize) -> Vec<Word> {
        let class = Self::size_class(words);
        {
            let mut classes = self.classes.lock();
            if let Some(buf) = classes.get_mut(&class).and_then(Vec::pop) {
                self.stats.record_hit();
                self.stats.sub_pooled(buf.capacity() as u64 * WORD_BYTES);
                return buf;
            }
        }
        self.stats.record_miss(class as u64 * WORD_BYTES);
        Vec::with_capacity(class)
    }

    /// Return a buffer to the pool.
    pub fn release(&self, buf: Vec<Word>) {
        let capacity = buf.capacity();
        if capacity < MIN_CLASS_WORDS || capacity > self.config.max_pooled_words {
            self.stats.record_eviction();
            return;
        }
        let bytes = capacity as u64 * WORD_BYTES;
        let retain_all = self.retains_all();
        if retain_all
            && self.stats.pooled_bytes() + bytes > self.retained_ceiling.load(Ordering::Relaxed)
        {
            self.stats.record_eviction();
            return;
        }

        let class = Self::class_floor(capacity);
        let mut classes = self.classes.lock();
        let list = classes.entry(class).or_default();
        if retain_all || list.len() < self.config.max_per_class {
            list.push(buf);
            self.stats.add_pooled(bytes);
        } else {
            self.stats.record_eviction();
        }
    }

    /// Round a request up to its size class.
    #[must_use]
    pub fn size_class(words: usize) -> usize {
        let mut class = MIN_CLASS_WORDS;
        while class < words {
            class *= 4;
        }
        class
    }

    /// Largest size class not exceeding `capacity`.
    fn class_floor(capacity: usize) -> usize {
        let mut class = MIN_CLASS_WORDS;
        while class * 4 <= capacity {
            class *= 4;
        }
        class
    }

    /// Suspend the per-class cap, optionally bounding pooled bytes.
    ///
    /// Every call must be paired with [`WordPool::resume_eviction`] passing
    /// the same ceiling.
    pub fn suspend_eviction(&self, ceiling: Option<u64>) {
        let mut ceilings = self.ceilings.lock();
        ceilings.push(ceiling.unwrap_or(u64::MAX));
        self.publish(&ceilings);
    }

    /// End one suspension started with `ceiling`.
    ///
    /// Returns `false` if no such suspension is active.
    pub fn resume_eviction(&self, ceiling: Option<u64>) -> bool {
        let ceiling = ceiling.unwrap_or(u64::MAX);
        let mut ceilings = self.ceilings.lock();
        let Some(pos) = ceilings.iter().position(|&c| c == ceiling) else {
            return false;
        };
        ceilings.swap_remove(pos);
        self.publish(&ceilings);
        true
    }

    fn publish(&self, ceilings: &[u64]) {
        let tightest = ceilings.iter().copied().min().unwrap_or(u64::MAX);
        self.retained_ceiling.store(tightest, Ordering::Relaxed);
        self.suspensions.store(ceilings.len(), Ordering::Release);
    }

    /// Whether the per-class cap is currently suspended.
    #[must_use]
    pub fn retains_all(&self) -> bool {
        self.suspensions() > 0
    }

    /// Number of active suspensions.
    #[must_use]
    pub fn suspensions(&self) -> usize {
        self.suspensions.load(Ordering::Acquire)
    }

    /// Byte ceiling currently applied while eviction is suspended.
    #[must_use]
    pub fn retention_ceiling(&self) -> Option<u64> {
        match self.retained_ceiling.load(Ordering::Relaxed) {
            u64::MAX => None,
            bytes => Some(bytes),
        }
    }

    /// Drop free buffers beyond the per-class cap. Returns the bytes freed.
    pub fn trim(&self) -> u64 {
        let mut freed = 0u64;
        let mut classes = self.classes.lock();
        for list in classes.values_mut() {
            while list.len() > self.config.max_per_class {
                if let Some(buf) = list.pop() {
                    freed += buf.capacity() as u64 * WORD_BYTES;
                }
            }
        }
        self.stats.sub_pooled(freed);
        freed
    }

    /// Drop every pooled buffer.
    pub fn clear(&self) {
        let mut classes = self.classes.lock();
        let freed: u64 = classes
            .values()
            .flatten()
            .map(|b| b.capacity() as u64 * WORD_BYTES)
            .sum();
        classes.clear();
        self.stats.sub_pooled(freed);
    }

    /// Pre-populate the class serving `words` with up to `count` buffers.
    pub fn warm(&self, words: usize, count: usize) {
        let class = Self::size_class(words);
        if class > self.config.max_pooled_words {
            return;
        }
        let mut classes = self.classes.lock();
        let list = classes.entry(class).or_default();
        let to_add = count
            .min(self.config.max_per_class)
            .saturating_sub(list.len());
        for _ in 0..to_add {
            list.push(Vec::with_capacity(class));
        }
        self.stats.add_pooled(to_add as u64 * class as u64 * WORD_BYTES);
    }

    /// Total number of pooled buffers.
    #[must_use]
    pub fn total_pooled(&self) -> usize {
        self.classes.lock().values().map(Vec::len).sum()
    }

    /// Snapshot of pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }

    /// Reset the event counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

impl Default for WordPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl std::fmt::Debug for WordPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
