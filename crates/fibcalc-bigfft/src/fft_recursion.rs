//! Recursive FFT with bounded parallelism.
//!
//! The transform splits into even and odd sub-transforms (radix-2,
//! decimation in time). The shallowest `parallel_depth` levels may run the
//! two halves on rayon workers, but only while the shared [`TaskSemaphore`]
//! grants a permit; otherwise the halves run inline. Once a transform has
//! started it runs to completion: cancellation is observed only between
//! transforms.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use fibcalc_memory::Word;

use crate::allocator::TempAllocator;
use crate::fft_core::{butterflies, direct, Scratch, DIRECT_MAX_ORDER};

/// Sub-transforms smaller than this never fork.
pub const PARALLEL_MIN_POINTS: usize = 64;

/// Default number of recursion levels allowed to fork.
pub const DEFAULT_PARALLEL_DEPTH: usize = 3;

/// Counting semaphore bounding concurrently active multiplication workers.
///
/// Acquisition never blocks: a caller that gets no permit does the work on
/// its own thread, which keeps rayon workers from waiting on each other.
#[derive(Debug)]
pub struct TaskSemaphore {
    available: AtomicUsize,
    capacity: usize,
}

impl TaskSemaphore {
    /// Semaphore with `permits` permits.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            available: AtomicUsize::new(permits),
            capacity: permits,
        }
    }

    /// Twice the available hardware parallelism.
    #[must_use]
    pub fn for_hardware() -> Self {
        let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self::new(2 * cores)
    }

    /// The process-wide semaphore.
    pub fn global() -> Arc<TaskSemaphore> {
        static GLOBAL: OnceLock<Arc<TaskSemaphore>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TaskSemaphore::for_hardware())))
    }

    /// Take a permit if one is free.
    pub fn try_acquire(&self) -> Option<TaskPermit<'_>> {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }
            match self.available.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(TaskPermit { sem: self }),
                Err(actual) => current = actual,
            }
        }
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    /// Total permits.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A held permit; released on drop.
#[derive(Debug)]
pub struct TaskPermit<'a> {
    sem: &'a TaskSemaphore,
}

impl Drop for TaskPermit<'_> {
    fn drop(&mut self) {
        self.sem.available.fetch_add(1, Ordering::AcqRel);
    }
}

/// One transform configuration: ring size, order and execution resources.
#[derive(Clone, Copy)]
pub struct Fourier<'a> {
    /// Ring size in words.
    pub n: usize,
    /// Transform order; the vector has `2^k` elements.
    pub k: u32,
    /// Levels allowed to fork.
    pub parallel_depth: usize,
    /// Shared worker budget.
    pub semaphore: &'a TaskSemaphore,
    /// Source of scratch buffers.
    pub alloc: &'a dyn TempAllocator,
}

impl Fourier<'_> {
    /// Transform `src` into `dst`; both hold `2^k` ring elements.
    ///
    /// The backward transform uses inverse roots and is not scaled.
    pub fn transform(&self, dst: &mut [Word], src: &[Word], backward: bool) {
        debug_assert_eq!(dst.len(), (1usize << self.k) * (self.n + 1));
        debug_assert_eq!(src.len(), dst.len());
        let mut scratch = Scratch::new(self.n, self.alloc);
        self.rec(dst, src, 0, 1, self.k, backward, 0, &mut scratch);
        scratch.release(self.alloc);
    }

    #[allow(clippy::too_many_arguments)]
    fn rec(
        &self,
        dst: &mut [Word],
        src: &[Word],
        offset: usize,
        stride: usize,
        size: u32,
        backward: bool,
        depth: usize,
        scratch: &mut Scratch,
    ) {
        if size <= DIRECT_MAX_ORDER {
            direct(dst, src, offset, stride, size, self.n, backward, scratch);
            return;
        }
        let half = (1usize << (size - 1)) * (self.n + 1);
        let (lo, hi) = dst.split_at_mut(half);

        let permit = if depth < self.parallel_depth && (1usize << size) >= PARALLEL_MIN_POINTS {
            self.semaphore.try_acquire()
        } else {
            None
        };
        if let Some(_permit) = permit {
            rayon::join(
                || self.rec(lo, src, offset, 2 * stride, size - 1, backward, depth + 1, scratch),
                || {
                    let mut own = Scratch::new(self.n, self.alloc);
                    self.rec(
                        hi,
                        src,
                        offset + stride,
                        2 * stride,
                        size - 1,
                        backward,
                        depth + 1,
                        &mut own,
                    );
                    own.release(self.alloc);
                },
            );
        } else {
            self.rec(lo, src, offset, 2 * stride, size - 1, backward, depth + 1, scratch);
            self.rec(hi, src, offset + stride, 2 * stride, size - 1, backward, depth + 1, scratch);
        }

        butterflies(lo, hi, self.n, size, backward, scratch);
    }
}
