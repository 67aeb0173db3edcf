//! Public FFT multiplication API.
//!
//! [`FftEngine`] owns the execution resources of the transform pipeline:
//! the transform cache, the temporary allocator and the worker semaphore.
//! It multiplies word slices into reusable destinations; the `BigUint`
//! helpers at the bottom route small operands to native multiplication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use num_bigint::BigUint;

use fibcalc_memory::words::{bit_len, normalized_len};
use fibcalc_memory::{Nat, Word, WordBuf};

use crate::allocator::{PoolAllocator, TempAllocator};
use crate::error::FftError;
use crate::fermat::{fft_size, validate_params, value_size};
use crate::fft_cache::{self, CacheStats, TransformCache};
use crate::fft_poly::{Poly, PolyValues};
use crate::fft_recursion::{Fourier, TaskSemaphore, DEFAULT_PARALLEL_DEPTH};

/// Threshold in bits above which the `BigUint` helpers use the FFT.
pub const FFT_BIT_THRESHOLD: usize = 10_000;

/// Transform execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FftConfig {
    /// Recursion levels allowed to fork onto worker threads.
    pub parallel_depth: usize,
}

impl Default for FftConfig {
    fn default() -> Self {
        Self {
            parallel_depth: DEFAULT_PARALLEL_DEPTH,
        }
    }
}

/// Engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FftStats {
    /// Forward and inverse transforms run to completion.
    pub transforms: u64,
    /// General products.
    pub multiplications: u64,
    /// Squarings.
    pub squarings: u64,
    /// Transform cache counters.
    pub cache: CacheStats,
}

/// Schönhage–Strassen multiplier over `Z/(2^(64n)+1)`.
pub struct FftEngine {
    config: FftConfig,
    cache: Arc<TransformCache>,
    alloc: Arc<dyn TempAllocator>,
    semaphore: Arc<TaskSemaphore>,
    transforms: AtomicU64,
    multiplications: AtomicU64,
    squarings: AtomicU64,
}

impl FftEngine {
    /// Engine over the process-wide cache, pool and semaphore.
    #[must_use]
    pub fn new(config: FftConfig) -> Self {
        Self::with_parts(
            config,
            TransformCache::global(),
            Arc::new(PoolAllocator::new()),
            TaskSemaphore::global(),
        )
    }

    /// Engine over injected resources.
    #[must_use]
    pub fn with_parts(
        config: FftConfig,
        cache: Arc<TransformCache>,
        alloc: Arc<dyn TempAllocator>,
        semaphore: Arc<TaskSemaphore>,
    ) -> Self {
        Self {
            config,
            cache,
            alloc,
            semaphore,
            transforms: AtomicU64::new(0),
            multiplications: AtomicU64::new(0),
            squarings: AtomicU64::new(0),
        }
    }

    /// The process-wide engine with default settings.
    pub fn global() -> Arc<FftEngine> {
        static GLOBAL: OnceLock<Arc<FftEngine>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(FftEngine::new(FftConfig::default()))))
    }

    /// Execution settings.
    #[must_use]
    pub fn config(&self) -> FftConfig {
        self.config
    }

    /// The transform cache this engine reads and fills.
    #[must_use]
    pub fn cache(&self) -> &Arc<TransformCache> {
        &self.cache
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> FftStats {
        FftStats {
            transforms: self.transforms.load(Ordering::Relaxed),
            multiplications: self.multiplications.load(Ordering::Relaxed),
            squarings: self.squarings.load(Ordering::Relaxed),
            cache: self.cache.stats(),
        }
    }

    fn fourier(&self, k: u32, n: usize) -> Fourier<'_> {
        Fourier {
            n,
            k,
            parallel_depth: self.config.parallel_depth,
            semaphore: &self.semaphore,
            alloc: &*self.alloc,
        }
    }

    /// `z = x * y`. `z` keeps its buffer when the product fits.
    pub fn mul_to<B: WordBuf + ?Sized>(
        &self,
        z: &mut B,
        x: &[Word],
        y: &[Word],
    ) -> Result<(), FftError> {
        let x = &x[..normalized_len(x)];
        let y = &y[..normalized_len(y)];
        if x.is_empty() || y.is_empty() {
            z.resize_words(0);
            return Ok(());
        }
        self.multiplications.fetch_add(1, Ordering::Relaxed);
        let (k, m) = fft_size(x.len(), y.len());
        let n = value_size(k, m);
        validate_params(k, m, n)?;
        let fourier = self.fourier(k, n);

        let px = self.forward(x, k, m, &fourier)?;
        let py = self.forward(y, k, m, &fourier)?;
        let product = px.mul(&py, &fourier)?;
        self.alloc.free(px.into_words());
        self.alloc.free(py.into_words());
        self.finish(z, product, x.len() + y.len(), m, &fourier)
    }

    /// `z = x * x` with a single forward transform.
    pub fn sqr_to<B: WordBuf + ?Sized>(&self, z: &mut B, x: &[Word]) -> Result<(), FftError> {
        let x = &x[..normalized_len(x)];
        if x.is_empty() {
            z.resize_words(0);
            return Ok(());
        }
        self.squarings.fetch_add(1, Ordering::Relaxed);
        let (k, m) = fft_size(x.len(), x.len());
        let n = value_size(k, m);
        validate_params(k, m, n)?;
        let fourier = self.fourier(k, n);

        let px = self.forward(x, k, m, &fourier)?;
        let square = px.sqr(&fourier);
        self.alloc.free(px.into_words());
        self.finish(z, square, 2 * x.len(), m, &fourier)
    }

    /// Product of two `BigUint`s through the transform pipeline.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> Result<BigUint, FftError> {
        let mut z = Nat::new();
        self.mul_to(&mut z, Nat::from_biguint(a).words(), Nat::from_biguint(b).words())?;
        Ok(z.to_biguint())
    }

    /// Square of a `BigUint` through the transform pipeline.
    pub fn sqr(&self, a: &BigUint) -> Result<BigUint, FftError> {
        let mut z = Nat::new();
        self.sqr_to(&mut z, Nat::from_biguint(a).words())?;
        Ok(z.to_biguint())
    }

    /// Forward transform of `x`, served from the cache when possible.
    fn forward(
        &self,
        x: &[Word],
        k: u32,
        m: usize,
        fourier: &Fourier<'_>,
    ) -> Result<PolyValues, FftError> {
        let cacheable = self.cache.accepts(bit_len(x));
        let key = if cacheable {
            let key = fft_cache::key(k, m, fourier.n, x);
            if let Some(values) = self.cache.get(key) {
                return Ok(PolyValues::from_words(k, fourier.n, values));
            }
            Some(key)
        } else {
            None
        };
        let values = Poly::from_words(x, k, m)?.transform(fourier);
        self.transforms.fetch_add(1, Ordering::Relaxed);
        if let Some(key) = key {
            self.cache.put(key, values.words().to_vec());
        }
        Ok(values)
    }

    fn finish<B: WordBuf + ?Sized>(
        &self,
        z: &mut B,
        values: PolyValues,
        words: usize,
        m: usize,
        fourier: &Fourier<'_>,
    ) -> Result<(), FftError> {
        let poly = values.inv_transform(m, fourier);
        self.transforms.fetch_add(1, Ordering::Relaxed);
        self.alloc.free(values.into_words());
        z.resize_words(words);
        let placed = poly.to_words(z.words_mut());
        self.alloc.free(poly.into_words());
        placed?;
        z.normalize();
        Ok(())
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new(FftConfig::default())
    }
}

impl std::fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftEngine")
            .field("config", &self.config)
            .field("semaphore", &self.semaphore)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Multiply two `BigUint`s, using the global engine for large operands.
pub fn mul(a: &BigUint, b: &BigUint) -> Result<BigUint, FftError> {
    let max_bits = a.bits().max(b.bits());
    if max_bits >= FFT_BIT_THRESHOLD as u64 {
        FftEngine::global().mul(a, b)
    } else {
        Ok(a * b)
    }
}

/// Square a `BigUint`, using the global engine for large operands.
pub fn sqr(a: &BigUint) -> Result<BigUint, FftError> {
    if a.bits() >= FFT_BIT_THRESHOLD as u64 {
        FftEngine::global().sqr(a)
    } else {
        Ok(a * a)
    }
}

/// `z = x * y` on word buffers through the global engine.
pub fn mul_to<B: WordBuf + ?Sized>(z: &mut B, x: &[Word], y: &[Word]) -> Result<(), FftError> {
    FftEngine::global().mul_to(z, x, y)
}

/// `z = x * x` on word buffers through the global engine.
pub fn sqr_to<B: WordBuf + ?Sized>(z: &mut B, x: &[Word]) -> Result<(), FftError> {
    FftEngine::global().sqr_to(z, x)
}
