//! Thread-safe LRU cache for forward transforms.
//!
//! Entries are content-addressed: the key is an FNV-1a fingerprint of the
//! transform parameters and the operand words. A hit hands back a deep copy,
//! so concurrent users never share a live transform buffer.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use lru::LruCache;
use parking_lot::Mutex;

use fibcalc_memory::Word;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Transform cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether lookups and insertions happen at all.
    pub enabled: bool,
    /// Maximum number of cached transforms.
    pub max_entries: usize,
    /// Operands shorter than this many bits are never cached.
    pub min_bit_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 256,
            min_bit_len: 100_000,
        }
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries pushed out by capacity.
    pub evictions: u64,
    /// Entries currently held.
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 before any lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    config: CacheConfig,
    entries: LruCache<u64, Vec<Word>>,
}

/// Process-wide cache of forward transforms.
pub struct TransformCache {
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Fingerprint of a forward transform: order, coefficient width, ring size
/// and operand contents.
#[must_use]
pub fn key(k: u32, m: usize, n: usize, words: &[Word]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut feed = |word: u64| {
        for b in word.to_le_bytes() {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    };
    feed(u64::from(k));
    feed(m as u64);
    feed(n as u64);
    for &w in words {
        feed(w);
    }
    hash
}

fn capacity(max_entries: usize) -> NonZeroUsize {
    NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)
}

impl TransformCache {
    /// Create a cache with the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                config,
                entries: LruCache::new(capacity(config.max_entries)),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The process-wide cache.
    pub fn global() -> Arc<TransformCache> {
        static GLOBAL: OnceLock<Arc<TransformCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TransformCache::default())))
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.inner.lock().config
    }

    /// Replace the configuration. Disabling drops every entry; shrinking
    /// evicts least recently used entries.
    pub fn set_config(&self, config: CacheConfig) {
        let mut inner = self.inner.lock();
        inner.config = config;
        if config.enabled {
            inner.entries.resize(capacity(config.max_entries));
        } else {
            inner.entries.clear();
        }
    }

    /// Whether an operand of `bits` bits is worth caching.
    #[must_use]
    pub fn accepts(&self, bits: usize) -> bool {
        let config = self.inner.lock().config;
        config.enabled && config.max_entries > 0 && bits >= config.min_bit_len
    }

    /// A copy of the transform stored under `key`, if any.
    pub fn get(&self, key: u64) -> Option<Vec<Word>> {
        let mut inner = self.inner.lock();
        if !inner.config.enabled {
            return None;
        }
        let found = inner.entries.get(&key).cloned();
        drop(inner);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store a transform under `key`.
    pub fn put(&self, key: u64, value: Vec<Word>) {
        let mut inner = self.inner.lock();
        if !inner.config.enabled || inner.config.max_entries == 0 {
            return;
        }
        if let Some((old, _)) = inner.entries.push(key, value) {
            if old != key {
                drop(inner);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = old, "transform cache eviction");
            }
        }
    }

    /// Number of cached transforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for TransformCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCache")
            .field("config", &self.config())
            .field("stats", &self.stats())
            .finish()
    }
}
