//! Allocator trait and implementations for transform temporaries.

use std::sync::Arc;

use fibcalc_memory::{PoolStats, Word, WordPool};

/// Source of word buffers for transform temporaries.
pub trait TempAllocator: Send + Sync {
    /// A zero-filled buffer of exactly `words` words.
    fn alloc(&self, words: usize) -> Vec<Word>;

    /// A buffer of exactly `words` words the caller will overwrite in full.
    fn alloc_raw(&self, words: usize) -> Vec<Word> {
        self.alloc(words)
    }

    /// Return a buffer for potential reuse.
    fn free(&self, buf: Vec<Word>);
}

/// Pool-backed allocator.
#[derive(Debug, Clone)]
pub struct PoolAllocator {
    pool: Arc<WordPool>,
}

impl PoolAllocator {
    /// Allocator over the process-wide pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: WordPool::global(),
        }
    }

    /// Allocator over an injected pool.
    #[must_use]
    pub fn with_pool(pool: Arc<WordPool>) -> Self {
        Self { pool }
    }

    /// The backing pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<WordPool> {
        &self.pool
    }

    /// Return a snapshot of pool usage statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Default for PoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TempAllocator for PoolAllocator {
    fn alloc(&self, words: usize) -> Vec<Word> {
        self.pool.acquire(words)
    }

    fn alloc_raw(&self, words: usize) -> Vec<Word> {
        self.pool.acquire_raw(words)
    }

    fn free(&self, buf: Vec<Word>) {
        self.pool.release(buf);
    }
}

/// Allocator that creates new buffers each time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleAllocator;

impl TempAllocator for SimpleAllocator {
    fn alloc(&self, words: usize) -> Vec<Word> {
        vec![0; words]
    }

    fn free(&self, _buf: Vec<Word>) {}
}
