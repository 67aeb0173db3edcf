//! Fast Doubling orchestrator.
//!
//! Walks the bits of n from the most significant down, keeping
//! (F(k), F(k+1)) and applying
//!
//! ```text
//! F(2k)   = 2*F(k)*F(k+1) - F(k)^2
//! F(2k+1) = F(k+1)^2 + F(k)^2
//! ```
//!
//! at every bit, followed by one addition when the bit is set. The five
//! numbers of the state live in a pre-sized arena block; the three
//! products of a step run concurrently once operands pass the parallel
//! threshold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use num_bigint::BigUint;
use tracing::{debug, info};

use fibcalc_bigfft::pool_warming::{estimate_result_bits, warm_pool_default};
use fibcalc_bigfft::{CacheConfig, FftConfig, FftEngine, PoolAllocator, TaskSemaphore, TransformCache};
use fibcalc_memory::words::words_to_biguint;
use fibcalc_memory::{ArenaBuf, CalculationArena, WordBuf, WordPool, WORD_BITS};

use crate::calculator::{calculate_with_fast_path, CoreCalculator, FibError};
use crate::common::{add_into, shl1_sub};
use crate::dynamic_threshold::policy_for;
use crate::gc_control::GcController;
use crate::memory_budget::MemoryEstimate;
use crate::observer::ProgressObserver;
use crate::options::Options;
use crate::progress::{step_fraction, CancellationToken, ProgressUpdate};
use crate::strategy::{Multiplier, TieredMultiplier};
use crate::threshold_types::StepTiming;

const NAME: &str = "FastDoubling";

/// Spare words per slot beyond the estimated result size.
const SLOT_SLACK_WORDS: usize = 4;

/// The five numbers of the doubling loop.
pub struct CalculationState<'a> {
    /// F(k).
    pub fk: ArenaBuf<'a>,
    /// F(k+1).
    pub fk1: ArenaBuf<'a>,
    /// F(k)*F(k+1), then F(2k).
    pub t1: ArenaBuf<'a>,
    /// F(k)^2.
    pub t2: ArenaBuf<'a>,
    /// F(k+1)^2, then F(2k+1).
    pub t3: ArenaBuf<'a>,
}

impl<'a> CalculationState<'a> {
    /// Carve the five slots from `arena`, starting at (F(0), F(1)).
    pub fn new(arena: &'a mut CalculationArena, slot_words: usize) -> Self {
        let mut region = arena.region();
        let mut state = Self {
            fk: region.alloc(slot_words),
            fk1: region.alloc(slot_words),
            t1: region.alloc_raw(slot_words),
            t2: region.alloc_raw(slot_words),
            t3: region.alloc_raw(slot_words),
        };
        state.fk1.set_u64(1);
        state
    }

    /// Slots that spilled to the heap.
    #[must_use]
    pub fn heap_slots(&self) -> usize {
        [&self.fk, &self.fk1, &self.t1, &self.t2, &self.t3]
            .iter()
            .filter(|b| !b.is_arena())
            .count()
    }

    /// One doubling step: (F(k), F(k+1)) becomes (F(2k), F(2k+1)).
    fn double(
        &mut self,
        mult: &TieredMultiplier,
        parallel: bool,
        cancel: &CancellationToken,
    ) -> Result<(), FibError> {
        let Self {
            fk,
            fk1,
            t1,
            t2,
            t3,
        } = self;
        let (x, y) = (fk.words(), fk1.words());

        if parallel {
            let (cross, (sq, sq1)) = rayon::join(
                || mult.multiply_to(t1, x, y),
                || rayon::join(|| mult.square_to(t2, x), || mult.square_to(t3, y)),
            );
            cross?;
            sq?;
            sq1?;
        } else {
            mult.multiply_to(t1, x, y)?;
            cancel.check()?;
            mult.square_to(t2, x)?;
            cancel.check()?;
            mult.square_to(t3, y)?;
        }

        shl1_sub(t1, t2.words())?;
        add_into(t3, t2.words());
        std::mem::swap(fk, t1);
        std::mem::swap(fk1, t3);
        Ok(())
    }

    /// (F(k), F(k+1)) becomes (F(k+1), F(k+2)).
    fn advance(&mut self) {
        add_into(&mut self.fk, self.fk1.words());
        std::mem::swap(&mut self.fk, &mut self.fk1);
    }
}

/// Fast Doubling calculator.
///
/// # Example
/// ```
/// use fibcalc_core::fastdoubling::FastDoubling;
/// use fibcalc_core::observers::NoOpObserver;
/// use fibcalc_core::options::Options;
/// use fibcalc_core::progress::CancellationToken;
///
/// let calc = FastDoubling::with_options(Options::default());
/// let cancel = CancellationToken::new();
/// let result = calc.calculate(100, &cancel, &NoOpObserver::new()).unwrap();
/// assert_eq!(result.to_string(), "354224848179261915075");
/// ```
pub struct FastDoubling {
    opts: Options,
    engine: Arc<FftEngine>,
    pool: Arc<WordPool>,
    last_checkpoints: AtomicU64,
}

impl FastDoubling {
    /// Calculator over the process-wide pool, with an engine matching
    /// `opts`.
    #[must_use]
    pub fn with_options(opts: Options) -> Self {
        let opts = opts.normalize();
        let pool = WordPool::global();
        let engine = engine_for(&opts, &pool);
        Self::with_parts(opts, engine, pool)
    }

    /// Calculator over injected resources. `opts` is used as given.
    #[must_use]
    pub fn with_parts(opts: Options, engine: Arc<FftEngine>, pool: Arc<WordPool>) -> Self {
        Self {
            opts,
            engine,
            pool,
            last_checkpoints: AtomicU64::new(0),
        }
    }

    /// The options this calculator runs with.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// The FFT engine behind the top multiplication tier.
    #[must_use]
    pub fn engine(&self) -> &Arc<FftEngine> {
        &self.engine
    }

    /// Cancellation checks made by the most recent core run.
    #[must_use]
    pub fn checkpoints(&self) -> u64 {
        self.last_checkpoints.load(Ordering::Relaxed)
    }

    /// F(n), with the table fast path and a final completion update.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the estimate exceeds the memory limit,
    /// `Cancelled`/`Timeout` from the token.
    pub fn calculate(
        &self,
        n: u64,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Result<BigUint, FibError> {
        calculate_with_fast_path(self, cancel, observer, n)
    }

    fn run(
        &self,
        arena: &mut CalculationArena,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        n: u64,
    ) -> Result<BigUint, FibError> {
        let slot_words = estimate_result_bits(n).div_ceil(WORD_BITS) + SLOT_SLACK_WORDS;
        let mut state = CalculationState::new(arena, slot_words);

        let mut policy = policy_for(&self.opts);
        let base = TieredMultiplier::with_engine(policy.current(), Arc::clone(&self.engine));
        let frozen = observer.freeze();
        let total = u64::from(64 - n.leading_zeros());

        for i in (0..total).rev() {
            cancel.check()?;

            let thresholds = policy.current();
            let mult = base.with_thresholds(thresholds);
            let bits = state.fk1.bits();
            let parallel = bits >= thresholds.parallel;
            let tier = mult.tier_for(bits, bits);

            let started = Instant::now();
            state.double(&mult, parallel, cancel)?;
            if (n >> i) & 1 == 1 {
                state.advance();
            }
            policy.observe(&StepTiming {
                bits,
                tier,
                parallel,
                duration: started.elapsed(),
            });

            let done = total - i;
            frozen.report(
                observer,
                &ProgressUpdate::new(NAME, step_fraction(done, total), done, total),
            );
        }

        if state.heap_slots() > 0 {
            debug!(n, heap_slots = state.heap_slots(), "doubling slots outgrew the arena");
        }
        Ok(words_to_biguint(state.fk.words()))
    }
}

impl Default for FastDoubling {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

impl CoreCalculator for FastDoubling {
    fn calculate_core(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        n: u64,
    ) -> Result<BigUint, FibError> {
        MemoryEstimate::estimate_with(n, &self.opts).check(self.opts.memory_limit())?;

        let mut gc = GcController::with_pool(self.opts.gc_mode, n, Arc::clone(&self.pool));
        let _guard = gc.guard();

        if estimate_result_bits(n) / 2 > self.opts.fft_threshold {
            warm_pool_default(&self.pool, n);
        }

        let started = Instant::now();
        let checks_before = cancel.checkpoints();
        let mut arena = CalculationArena::for_fibonacci(n);
        let result = self.run(&mut arena, cancel, observer, n);
        arena.reset();
        let checks = cancel.checkpoints() - checks_before;
        self.last_checkpoints.store(checks, Ordering::Relaxed);

        match &result {
            Ok(value) => info!(
                n,
                bits = value.bits(),
                elapsed_ms = started.elapsed().as_millis(),
                checkpoints = checks,
                fallbacks = arena.fallbacks(),
                "fast doubling finished"
            ),
            Err(err) => debug!(n, %err, checkpoints = checks, "fast doubling stopped"),
        }
        result
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// Engine whose cache matches `opts.transform_cache`.
///
/// The shared cache is reused when it already has the requested settings;
/// otherwise the engine gets a private cache and global state is left as is.
#[must_use]
pub fn engine_for(opts: &Options, pool: &Arc<WordPool>) -> Arc<FftEngine> {
    let wanted: CacheConfig = opts.transform_cache.into();
    let shared = TransformCache::global();
    let cache = if shared.config() == wanted {
        shared
    } else {
        Arc::new(TransformCache::new(wanted))
    };
    Arc::new(FftEngine::with_parts(
        FftConfig {
            parallel_depth: opts.fft_parallel_depth,
        },
        cache,
        Arc::new(PoolAllocator::with_pool(Arc::clone(pool))),
        TaskSemaphore::global(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observers::{FnObserver, NoOpObserver};
    use crate::options::GcMode;
    use num_traits::{One, Zero};
    use parking_lot::Mutex;

    fn reference(n: u64) -> BigUint {
        let (mut a, mut b) = (BigUint::zero(), BigUint::one());
        for _ in 0..n {
            let next = &a + &b;
            a = std::mem::replace(&mut b, next);
        }
        a
    }

    fn fib(calc: &FastDoubling, n: u64) -> BigUint {
        calc.calculate(n, &CancellationToken::new(), &NoOpObserver::new())
            .unwrap()
    }

    fn small_thresholds() -> Options {
        Options {
            parallel_threshold: 256,
            fft_threshold: 2048,
            strassen_threshold: 512,
            ..Options::default()
        }
    }

    #[test]
    fn fast_doubling_small() {
        let calc = FastDoubling::default();
        assert_eq!(fib(&calc, 0), BigUint::zero());
        assert_eq!(fib(&calc, 1), BigUint::one());
        assert_eq!(fib(&calc, 2), BigUint::one());
        assert_eq!(fib(&calc, 10), BigUint::from(55u32));
        assert_eq!(fib(&calc, 93), BigUint::from(12_200_160_415_121_876_738u64));
    }

    #[test]
    fn fast_doubling_100() {
        let calc = FastDoubling::default();
        assert_eq!(fib(&calc, 100).to_string(), "354224848179261915075");
    }

    #[test]
    fn fast_doubling_1000() {
        let calc = FastDoubling::default();
        let result = fib(&calc, 1000).to_string();
        assert!(result.starts_with("43466557686937456435688527675040625802564660517371780402481729089536555417949051890403879840079255169295922593080322634775209689623239873322471161642996440906533187938298969649928516003704476137795166849228875"));
        assert_eq!(result.len(), 209);
    }

    #[test]
    fn core_path_matches_reference() {
        let calc = FastDoubling::default();
        for n in [94u64, 95, 127, 128, 129, 500, 1023, 1024, 2047, 3000] {
            assert_eq!(fib(&calc, n), reference(n), "F({n})");
        }
    }

    #[test]
    fn every_tier_matches_reference() {
        let calc = FastDoubling::with_options(small_thresholds());
        for n in [2_000u64, 5_000, 10_007] {
            assert_eq!(fib(&calc, n), reference(n), "F({n})");
        }
        assert!(calc.engine().stats().squarings > 0);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let sequential = FastDoubling::with_options(Options {
            parallel_threshold: usize::MAX,
            ..small_thresholds()
        });
        let parallel = FastDoubling::with_options(Options {
            parallel_threshold: 64,
            ..small_thresholds()
        });
        for n in [4_000u64, 20_000] {
            assert_eq!(fib(&sequential, n), fib(&parallel, n), "F({n})");
        }
    }

    #[test]
    fn adaptive_thresholds_keep_results_exact() {
        let calc = FastDoubling::with_options(Options {
            adaptive_thresholds: true,
            ..small_thresholds()
        });
        assert_eq!(fib(&calc, 30_000), reference(30_000));
    }

    #[test]
    fn state_starts_at_zero_one() {
        let mut arena = CalculationArena::new(64);
        let state = CalculationState::new(&mut arena, 8);
        assert!(state.fk.is_empty());
        assert_eq!(state.fk1.words(), &[1]);
        assert_eq!(state.heap_slots(), 0);
    }

    #[test]
    fn undersized_arena_spills_to_heap() {
        let mut arena = CalculationArena::new(10);
        let state = CalculationState::new(&mut arena, 4);
        assert_eq!(state.heap_slots(), 3);
    }

    #[test]
    fn memory_limit_rejects_before_work() {
        let calc = FastDoubling::with_options(Options {
            memory_limit_bytes: 1024,
            ..Options::default()
        });
        let cancel = CancellationToken::new();
        let result = calc.calculate(1_000_000, &cancel, &NoOpObserver::new());
        assert!(matches!(result, Err(FibError::ResourceExhausted { limit: 1024, .. })));
        // No loop checkpoint ran.
        assert_eq!(calc.checkpoints(), 0);
    }

    #[test]
    fn memory_limit_does_not_affect_fast_path() {
        let calc = FastDoubling::with_options(Options {
            memory_limit_bytes: 1,
            ..Options::default()
        });
        assert_eq!(fib(&calc, 50), BigUint::from(12_586_269_025u64));
    }

    #[test]
    fn cancelled_token_stops_calculation() {
        let calc = FastDoubling::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = calc.calculate(100_000, &cancel, &NoOpObserver::new());
        assert_eq!(result, Err(FibError::Cancelled));
    }

    #[test]
    fn cancel_from_progress_callback() {
        let calc = FastDoubling::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let observer = FnObserver::new(move |p| {
            if p >= 0.5 {
                trigger.cancel();
            }
        });
        let result = calc.calculate(1_000_000, &cancel, &observer);
        assert_eq!(result, Err(FibError::Cancelled));
        assert!(calc.checkpoints() > 0);
    }

    #[test]
    fn checkpoints_cover_every_bit() {
        let calc = FastDoubling::with_options(Options {
            parallel_threshold: 0,
            ..Options::default()
        });
        let cancel = CancellationToken::new();
        calc.calculate(1 << 20, &cancel, &NoOpObserver::new()).unwrap();
        // At least one check per bit of n.
        assert!(calc.checkpoints() >= 21);
    }

    #[test]
    fn progress_is_monotonic_and_completes() {
        let calc = FastDoubling::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = FnObserver::with_threshold(move |p| sink.lock().push(p), 0.0);
        calc.calculate(50_000, &CancellationToken::new(), &observer)
            .unwrap();

        let seen = seen.lock();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!((seen[seen.len() - 1] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gc_mode_leaves_pool_policy_restored() {
        let pool = Arc::new(WordPool::default());
        let opts = Options {
            gc_mode: GcMode::Aggressive,
            ..small_thresholds()
        }
        .normalize();
        let engine = engine_for(&opts, &pool);
        let calc = FastDoubling::with_parts(opts, engine, Arc::clone(&pool));
        assert_eq!(fib(&calc, 20_000), reference(20_000));
        assert!(!pool.retains_all());
    }

    #[test]
    fn disabled_cache_uses_private_cache() {
        let mut opts = Options::default();
        opts.transform_cache.enabled = false;
        let engine = engine_for(&opts, &WordPool::global());
        assert!(!engine.cache().config().enabled);
        assert!(TransformCache::global().config().enabled);
    }

    #[test]
    fn default_cache_is_shared() {
        let engine = engine_for(&Options::default(), &WordPool::global());
        assert!(Arc::ptr_eq(engine.cache(), &TransformCache::global()));
    }

    #[test]
    fn core_name() {
        assert_eq!(FastDoubling::default().name(), "FastDoubling");
    }
}
