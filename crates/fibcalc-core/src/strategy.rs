//! Multiplication strategy tier.
//!
//! `Multiplier` is the narrow interface the doubling loop multiplies through.
//! `TieredMultiplier` picks schoolbook, Karatsuba or the FFT engine from the
//! operand bit lengths and an immutable [`Thresholds`] snapshot.

use std::sync::Arc;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use fibcalc_bigfft::{nat, FftEngine};
use fibcalc_memory::words::{bit_len, words_to_biguint};
use fibcalc_memory::{Nat, Word, WordBuf, WORD_BITS};

use crate::calculator::FibError;
use crate::constants::{
    DEFAULT_FFT_THRESHOLD, DEFAULT_PARALLEL_THRESHOLD, DEFAULT_STRASSEN_THRESHOLD,
};
use crate::options::Options;

/// Which multiplication algorithm handles a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MulTier {
    /// Quadratic schoolbook product.
    Schoolbook,
    /// Three-product Karatsuba recursion (three squarings when squaring).
    Karatsuba,
    /// Schönhage–Strassen over Fermat rings.
    Fft,
}

/// Bit-length thresholds driving tier selection and step parallelism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Operand bits from which the three doubling products run concurrently.
    pub parallel: usize,
    /// Operand bits above which products go through the FFT engine.
    pub fft: usize,
    /// Operand bits above which Karatsuba replaces schoolbook.
    pub strassen: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_PARALLEL_THRESHOLD,
            fft: DEFAULT_FFT_THRESHOLD,
            strassen: DEFAULT_STRASSEN_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Thresholds carried by normalized options.
    #[must_use]
    pub fn from_options(opts: &Options) -> Self {
        Self {
            parallel: opts.parallel_threshold,
            fft: opts.fft_threshold,
            strassen: opts.strassen_threshold,
        }
    }

    /// Karatsuba cut-over in words, as the native kernels expect it.
    #[must_use]
    pub fn karatsuba_words(&self) -> usize {
        self.strassen.div_ceil(WORD_BITS).max(1)
    }

    /// Tier for a product of operands with the given bit lengths.
    #[must_use]
    pub fn tier(&self, x_bits: usize, y_bits: usize) -> MulTier {
        if x_bits > self.fft && y_bits > self.fft {
            MulTier::Fft
        } else if x_bits.min(y_bits) > self.strassen {
            MulTier::Karatsuba
        } else {
            MulTier::Schoolbook
        }
    }
}

/// Narrow interface for multiplication into reusable destinations.
pub trait Multiplier: Send + Sync {
    /// `z = x * y`. `z` keeps its buffer when the product fits.
    fn multiply_to(&self, z: &mut dyn WordBuf, x: &[Word], y: &[Word]) -> Result<(), FibError>;

    /// `z = x * x`, through the dedicated squaring path of the tier.
    fn square_to(&self, z: &mut dyn WordBuf, x: &[Word]) -> Result<(), FibError>;

    /// Tier used for operands of the given bit lengths.
    fn tier_for(&self, x_bits: usize, y_bits: usize) -> MulTier;

    /// Get the name of this multiplication strategy.
    fn name(&self) -> &'static str;

    /// Multiply two `BigUint`s.
    fn multiply(&self, a: &BigUint, b: &BigUint) -> Result<BigUint, FibError> {
        let (x, y) = (Nat::from_biguint(a), Nat::from_biguint(b));
        let mut z = Nat::new();
        self.multiply_to(&mut z, x.words(), y.words())?;
        Ok(words_to_biguint(z.words()))
    }

    /// Square a `BigUint`.
    fn square(&self, a: &BigUint) -> Result<BigUint, FibError> {
        let x = Nat::from_biguint(a);
        let mut z = Nat::new();
        self.square_to(&mut z, x.words())?;
        Ok(words_to_biguint(z.words()))
    }
}

/// Default strategy: native kernels below the FFT threshold, the FFT
/// engine above it.
#[derive(Clone)]
pub struct TieredMultiplier {
    thresholds: Thresholds,
    engine: Arc<FftEngine>,
}

impl TieredMultiplier {
    /// Strategy over the process-wide FFT engine.
    #[must_use]
    pub fn new(thresholds: Thresholds) -> Self {
        Self::with_engine(thresholds, FftEngine::global())
    }

    /// Strategy over an injected FFT engine.
    #[must_use]
    pub fn with_engine(thresholds: Thresholds, engine: Arc<FftEngine>) -> Self {
        Self { thresholds, engine }
    }

    /// The thresholds this strategy was built with.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Same engine, different thresholds.
    #[must_use]
    pub fn with_thresholds(&self, thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            engine: Arc::clone(&self.engine),
        }
    }

    /// The FFT engine products above the threshold go through.
    #[must_use]
    pub fn engine(&self) -> &Arc<FftEngine> {
        &self.engine
    }
}

impl Default for TieredMultiplier {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl Multiplier for TieredMultiplier {
    fn multiply_to(&self, z: &mut dyn WordBuf, x: &[Word], y: &[Word]) -> Result<(), FibError> {
        let tier = self.tier_for(bit_len(x), bit_len(y));
        tracing::trace!(?tier, x_words = x.len(), y_words = y.len(), "multiply");
        match tier {
            MulTier::Fft => self.engine.mul_to(z, x, y)?,
            MulTier::Karatsuba => nat::mul_to(z, x, y, self.thresholds.karatsuba_words()),
            MulTier::Schoolbook => nat::mul_to(z, x, y, usize::MAX),
        }
        Ok(())
    }

    fn square_to(&self, z: &mut dyn WordBuf, x: &[Word]) -> Result<(), FibError> {
        let bits = bit_len(x);
        let tier = self.tier_for(bits, bits);
        tracing::trace!(?tier, words = x.len(), "square");
        match tier {
            MulTier::Fft => self.engine.sqr_to(z, x)?,
            MulTier::Karatsuba => nat::sqr_to(z, x, self.thresholds.karatsuba_words()),
            MulTier::Schoolbook => nat::sqr_to(z, x, usize::MAX),
        }
        Ok(())
    }

    fn tier_for(&self, x_bits: usize, y_bits: usize) -> MulTier {
        self.thresholds.tier(x_bits, y_bits)
    }

    fn name(&self) -> &'static str {
        "Tiered"
    }
}
