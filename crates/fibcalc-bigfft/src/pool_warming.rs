//! Pool warming: pre-populate the word pool before a large calculation.
//!
//! Predicts the buffer sizes a Fibonacci computation of a given N will ask
//! the pool for (transform vectors and their scratch) and fills the
//! matching size classes, so the first doubling steps do not pay for cold
//! allocations.

use fibcalc_memory::{WordPool, LOG2_PHI, WORD_BITS};

use crate::fermat::{fft_size, value_size};

/// Configuration for pool warming thresholds.
#[derive(Debug, Clone)]
pub struct WarmingConfig {
    /// Minimum N to trigger warming (below this, allocation is cheap).
    pub min_n: u64,
    /// Threshold for medium warming (more pre-allocations).
    pub medium_threshold: u64,
    /// Threshold for aggressive warming.
    pub large_threshold: u64,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            min_n: 1_000,
            medium_threshold: 100_000,
            large_threshold: 1_000_000,
        }
    }
}

/// Predicted buffer sizes for a computation.
#[derive(Debug, Clone)]
pub struct SizePrediction {
    /// Estimated result size in bits.
    pub result_bits: usize,
    /// `(words, count)` pairs to pre-allocate.
    pub allocations: Vec<(usize, usize)>,
}

/// Estimate the number of bits in F(n).
///
/// F(n) ~ phi^n / sqrt(5), so log2(F(n)) ~ n * log2(phi).
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn estimate_result_bits(n: u64) -> usize {
    if n <= 1 {
        return 1;
    }
    let bits = (n as f64 * LOG2_PHI).ceil() as usize;
    bits.max(1)
}

/// Words in one transform vector for squaring an operand of `words` words.
#[must_use]
pub fn transform_words(words: usize) -> usize {
    let (k, m) = fft_size(words, words);
    (1usize << k).saturating_mul(value_size(k, m).saturating_add(1))
}

/// Predict the pool requests made while computing F(n).
///
/// The last doubling steps square operands of about half the result size,
/// the step before a quarter; each squaring holds a source vector, its
/// transform and the pointwise product.
#[must_use]
pub fn predict_sizes(n: u64) -> SizePrediction {
    let result_bits = estimate_result_bits(n);
    let result_words = result_bits.div_ceil(WORD_BITS);

    let mut allocations = Vec::new();
    if result_words <= 1 {
        allocations.push((1, 2));
    } else if result_bits <= 10_000 {
        allocations.push((result_words, 6));
        allocations.push((result_words.div_ceil(2), 4));
    } else {
        let half = result_words.div_ceil(2);
        allocations.push((transform_words(half), 4));
        allocations.push((transform_words(half.div_ceil(2)), 3));
        allocations.push((transform_words(half.div_ceil(4)), 2));
    }

    SizePrediction {
        result_bits,
        allocations,
    }
}

/// Warm a pool based on the predicted sizes for computing F(n).
pub fn warm_pool(pool: &WordPool, n: u64, config: &WarmingConfig) {
    if n < config.min_n {
        return;
    }

    let prediction = predict_sizes(n);
    let scale = if n >= config.large_threshold {
        2
    } else {
        1
    };

    for &(words, count) in &prediction.allocations {
        pool.warm(words, count * scale);
    }
    tracing::debug!(
        n,
        classes = prediction.allocations.len(),
        pooled = pool.total_pooled(),
        "word pool warmed"
    );
}

/// Warm a pool with default configuration.
pub fn warm_pool_default(pool: &WordPool, n: u64) {
    warm_pool(pool, n, &WarmingConfig::default());
}
