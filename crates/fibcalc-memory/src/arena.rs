//! Bump arena for the big numbers of a single calculation.
//!
//! One `bumpalo` chunk is pre-sized from the expected result size and capped
//! with an allocation limit, so the arena never grows past it. A
//! [`BumpRegion`] carves word slices out of that chunk; each carve-out is
//! handed to an [`ArenaBuf`], which migrates to a heap vector if it ever
//! needs to outgrow its slice. Requests the chunk cannot serve fall back to
//! the heap. Individual buffers are never freed; [`CalculationArena::reset`]
//! rewinds the whole chunk at once.

use bumpalo::Bump;
use tracing::debug;

use crate::words::{Word, WordBuf, LOG2_PHI, WORD_BITS};

/// Big numbers that live at once during a doubling run.
const FIB_LIVE_SLOTS: usize = 10;

/// Below this index the arena is not worth pre-sizing.
const MIN_ARENA_INDEX: u64 = 1000;

const WORD_BYTES: usize = std::mem::size_of::<Word>();

/// Pre-sized bump arena backing one calculation.
#[derive(Debug, Default)]
pub struct CalculationArena {
    bump: Bump,
    capacity: usize,
    used: usize,
    fallbacks: usize,
}

impl CalculationArena {
    /// Arena with room for `words` words.
    #[must_use]
    pub fn new(words: usize) -> Self {
        let bump = Bump::with_capacity(words.saturating_mul(WORD_BYTES));
        // No chunk beyond the pre-sized one.
        bump.set_allocation_limit(Some(bump.allocated_bytes()));
        Self {
            bump,
            capacity: words,
            used: 0,
            fallbacks: 0,
        }
    }

    /// Arena sized for computing F(n) with the doubling state.
    ///
    /// Small indices get an empty arena; every allocation then falls back
    /// to the heap.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn for_fibonacci(n: u64) -> Self {
        if n < MIN_ARENA_INDEX {
            return Self::new(0);
        }
        let words_per_slot = ((n as f64 * LOG2_PHI) / WORD_BITS as f64).ceil() as usize + 1;
        let words = words_per_slot.saturating_mul(FIB_LIVE_SLOTS);
        debug!(n, words, "pre-sizing calculation arena");
        Self::new(words)
    }

    /// Start carving from the current position.
    pub fn region(&mut self) -> BumpRegion<'_> {
        let Self {
            bump,
            capacity,
            used,
            fallbacks,
        } = self;
        BumpRegion {
            bump: &*bump,
            capacity: *capacity,
            used,
            fallbacks,
        }
    }

    /// Release every carve-out at once.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.used = 0;
    }

    /// Words the arena was sized for.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Words carved since the last reset.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes held by the underlying chunk.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Allocations that did not fit and went to the heap.
    #[must_use]
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }
}

/// Exclusive cursor into an arena's free space.
#[derive(Debug)]
pub struct BumpRegion<'a> {
    bump: &'a Bump,
    capacity: usize,
    used: &'a mut usize,
    fallbacks: &'a mut usize,
}

impl<'a> BumpRegion<'a> {
    /// Carve a zeroed buffer with `words` words of capacity and zero length.
    pub fn alloc(&mut self, words: usize) -> ArenaBuf<'a> {
        let bump = self.bump;
        self.carve(words, || bump.try_alloc_slice_fill_copy(words, 0).ok())
            .map_or_else(|| ArenaBuf::heap(words), ArenaBuf::from_slice)
    }

    /// Carve a buffer whose words the caller overwrites before reading.
    ///
    /// The logical length starts at zero, so the carve-out's contents are
    /// never observable through [`WordBuf::words`] until written.
    pub fn alloc_raw(&mut self, words: usize) -> ArenaBuf<'a> {
        let bump = self.bump;
        self.carve(words, || bump.try_alloc_slice_fill_default(words).ok())
            .map_or_else(|| ArenaBuf::heap(words), ArenaBuf::from_slice)
    }

    /// Carve a zeroed scratch slice of `words` words.
    pub fn scratch(&mut self, words: usize) -> Option<&'a mut [Word]> {
        let bump = self.bump;
        self.carve(words, || bump.try_alloc_slice_fill_copy(words, 0).ok())
    }

    /// Words still free in this region.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - *self.used
    }

    fn carve(
        &mut self,
        words: usize,
        alloc: impl FnOnce() -> Option<&'a mut [Word]>,
    ) -> Option<&'a mut [Word]> {
        let slice = if words > self.remaining() { None } else { alloc() };
        match slice {
            Some(slice) => {
                *self.used += words;
                Some(slice)
            }
            None => {
                *self.fallbacks += 1;
                None
            }
        }
    }
}

enum Storage<'a> {
    Arena(&'a mut [Word]),
    Heap(Vec<Word>),
}

/// A natural number's words, backed by an arena slice or by the heap.
pub struct ArenaBuf<'a> {
    storage: Storage<'a>,
    len: usize,
}

impl<'a> ArenaBuf<'a> {
    fn from_slice(slice: &'a mut [Word]) -> Self {
        Self {
            storage: Storage::Arena(slice),
            len: 0,
        }
    }

    /// Heap-backed buffer with `words` words of capacity.
    #[must_use]
    pub fn heap(words: usize) -> Self {
        Self {
            storage: Storage::Heap(vec![0; words]),
            len: 0,
        }
    }

    /// Whether the words still live in the arena chunk.
    #[must_use]
    pub fn is_arena(&self) -> bool {
        matches!(self.storage, Storage::Arena(_))
    }

    /// Start of the backing storage.
    #[must_use]
    pub fn as_ptr(&self) -> *const Word {
        self.backing().as_ptr()
    }

    fn backing(&self) -> &[Word] {
        match &self.storage {
            Storage::Arena(s) => s,
            Storage::Heap(v) => v,
        }
    }

    fn backing_mut(&mut self) -> &mut [Word] {
        match &mut self.storage {
            Storage::Arena(s) => s,
            Storage::Heap(v) => v,
        }
    }
}

impl WordBuf for ArenaBuf<'_> {
    fn words(&self) -> &[Word] {
        &self.backing()[..self.len]
    }

    fn words_mut(&mut self) -> &mut [Word] {
        let len = self.len;
        &mut self.backing_mut()[..len]
    }

    fn capacity(&self) -> usize {
        self.backing().len()
    }

    fn resize_words(&mut self, len: usize) {
        let cap = self.capacity();
        if len > cap {
            let mut grown = vec![0; len.max(cap * 2)];
            grown[..self.len].copy_from_slice(self.words());
            self.storage = Storage::Heap(grown);
        } else if len > self.len {
            let old = self.len;
            self.backing_mut()[old..len].fill(0);
        }
        self.len = len;
    }
}

impl std::fmt::Debug for ArenaBuf<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaBuf")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("arena", &self.is_arena())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_range(buf: &ArenaBuf<'_>) -> (usize, usize) {
        let start = buf.as_ptr() as usize;
        (start, start + buf.capacity() * WORD_BYTES)
    }

    #[test]
    fn small_index_has_empty_arena() {
        let arena = CalculationArena::for_fibonacci(999);
        assert_eq!(arena.capacity(), 0);
    }

    #[test]
    fn fibonacci_sizing() {
        let arena = CalculationArena::for_fibonacci(10_000);
        // ceil(10000 * 0.694242 / 64) + 1 = 110
        assert_eq!(arena.capacity(), 1100);
        assert!(arena.allocated_bytes() >= 1100 * WORD_BYTES);
    }

    #[test]
    fn carve_outs_are_disjoint() {
        let mut arena = CalculationArena::new(100);
        {
            let mut region = arena.region();
            let mut a = region.alloc(40);
            let mut b = region.alloc(40);
            a.resize_words(40);
            b.resize_words(40);
            a.words_mut().fill(1);
            b.words_mut().fill(2);
            assert!(a.words().iter().all(|&w| w == 1));
            assert!(b.words().iter().all(|&w| w == 2));
            assert!(a.is_arena() && b.is_arena());
            assert_eq!(region.remaining(), 20);
        }
        assert_eq!(arena.used(), 80);
    }

    #[test]
    fn live_carve_outs_never_overlap() {
        let mut arena = CalculationArena::new(4096);
        let mut region = arena.region();
        // Mixed sizes, the last ones past capacity so heap buffers join in.
        let bufs: Vec<ArenaBuf<'_>> = (1..=64)
            .map(|i| {
                if i % 2 == 0 {
                    region.alloc(i * 3)
                } else {
                    region.alloc_raw(i * 3)
                }
            })
            .collect();
        assert!(bufs.iter().any(ArenaBuf::is_arena));
        assert!(bufs.iter().any(|b| !b.is_arena()));

        let mut ranges: Vec<(usize, usize)> = bufs.iter().map(byte_range).collect();
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn overflow_falls_back_to_heap() {
        let mut arena = CalculationArena::new(10);
        {
            let mut region = arena.region();
            let buf = region.alloc(11);
            assert!(!buf.is_arena());
            assert_eq!(buf.capacity(), 11);
        }
        assert_eq!(arena.fallbacks(), 1);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn empty_arena_serves_from_heap() {
        let mut arena = CalculationArena::for_fibonacci(10);
        let mut region = arena.region();
        let buf = region.alloc(4);
        assert!(!buf.is_arena());
        assert!(region.scratch(1).is_none());
    }

    #[test]
    fn growth_migrates_to_heap() {
        let mut arena = CalculationArena::new(8);
        let mut region = arena.region();
        let mut buf = region.alloc(4);
        buf.set_words(&[1, 2, 3, 4]);
        buf.resize_words(6);
        assert!(!buf.is_arena());
        assert_eq!(buf.words(), &[1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn shrink_then_grow_zeroes_tail() {
        let mut arena = CalculationArena::new(8);
        let mut region = arena.region();
        let mut buf = region.alloc(8);
        buf.set_words(&[5, 6, 7]);
        buf.resize_words(1);
        buf.resize_words(3);
        assert_eq!(buf.words(), &[5, 0, 0]);
        assert!(buf.is_arena());
    }

    #[test]
    fn reset_reproduces_fresh_allocations() {
        fn run(arena: &mut CalculationArena) -> Vec<Vec<Word>> {
            let mut region = arena.region();
            let mut out = Vec::new();
            for size in [3, 5, 7] {
                let mut buf = region.alloc(size);
                buf.resize_words(size);
                out.push(buf.words().to_vec());
                buf.words_mut().fill(u64::MAX);
            }
            out
        }
        let mut fresh = CalculationArena::new(32);
        let first = run(&mut fresh);
        fresh.reset();
        assert_eq!(fresh.used(), 0);
        let second = run(&mut fresh);
        assert_eq!(first, second);
        assert_eq!(fresh.fallbacks(), 0);
    }
}
