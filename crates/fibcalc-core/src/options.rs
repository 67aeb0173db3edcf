//! Calculation options and configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fibcalc_bigfft::CacheConfig;

use crate::calculator::FibError;
use crate::constants::{
    DEFAULT_FFT_PARALLEL_DEPTH, DEFAULT_FFT_THRESHOLD, DEFAULT_PARALLEL_THRESHOLD,
    DEFAULT_STRASSEN_THRESHOLD,
};

/// When the allocation controller suspends pool eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcMode {
    /// Suspend only for large indices.
    #[default]
    Auto,
    /// Always suspend.
    Aggressive,
    /// Never suspend.
    Disabled,
}

impl FromStr for GcMode {
    type Err = FibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "aggressive" => Ok(Self::Aggressive),
            "disabled" => Ok(Self::Disabled),
            other => Err(FibError::Config(format!(
                "unknown gc mode '{other}' (expected auto, aggressive or disabled)"
            ))),
        }
    }
}

impl fmt::Display for GcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Aggressive => "aggressive",
            Self::Disabled => "disabled",
        })
    }
}

/// Transform cache settings carried in the options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformCacheConfig {
    /// Whether forward transforms are cached at all.
    pub enabled: bool,
    /// LRU capacity.
    pub max_entries: usize,
    /// Operands shorter than this many bits are never cached.
    pub min_bit_len: usize,
}

impl Default for TransformCacheConfig {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            enabled: cache.enabled,
            max_entries: cache.max_entries,
            min_bit_len: cache.min_bit_len,
        }
    }
}

impl From<TransformCacheConfig> for CacheConfig {
    fn from(c: TransformCacheConfig) -> Self {
        Self {
            enabled: c.enabled,
            max_entries: c.max_entries,
            min_bit_len: c.min_bit_len,
        }
    }
}

/// Options for Fibonacci calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Threshold (in bits) for running the three doubling products concurrently.
    pub parallel_threshold: usize,
    /// Threshold (in bits) for FFT multiplication.
    pub fft_threshold: usize,
    /// Threshold (in bits) for Karatsuba multiplication.
    pub strassen_threshold: usize,
    /// Allocation controller mode.
    pub gc_mode: GcMode,
    /// Memory limit in bytes (0 = unlimited).
    pub memory_limit_bytes: u64,
    /// Transform cache settings, applied to the engine's cache.
    pub transform_cache: TransformCacheConfig,
    /// FFT recursion levels allowed to fork.
    pub fft_parallel_depth: usize,
    /// Let observed step timings move the thresholds during the run.
    pub adaptive_thresholds: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            fft_threshold: DEFAULT_FFT_THRESHOLD,
            strassen_threshold: DEFAULT_STRASSEN_THRESHOLD,
            gc_mode: GcMode::Auto,
            memory_limit_bytes: 0,
            transform_cache: TransformCacheConfig::default(),
            fft_parallel_depth: DEFAULT_FFT_PARALLEL_DEPTH,
            adaptive_thresholds: false,
        }
    }
}

impl Options {
    /// Normalize options, applying defaults where values are zero.
    ///
    /// A zero parallel threshold is resolved against the hardware: on a
    /// single core the doubling products never fork.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.parallel_threshold == 0 {
            self.parallel_threshold = hardware_parallel_threshold();
        }
        if self.fft_threshold == 0 {
            self.fft_threshold = DEFAULT_FFT_THRESHOLD;
        }
        if self.strassen_threshold == 0 {
            self.strassen_threshold = DEFAULT_STRASSEN_THRESHOLD;
        }
        if self.fft_parallel_depth == 0 && hardware_threads() > 1 {
            self.fft_parallel_depth = DEFAULT_FFT_PARALLEL_DEPTH;
        }
        self
    }

    /// Memory limit, `None` when unlimited.
    #[must_use]
    pub fn memory_limit(&self) -> Option<u64> {
        (self.memory_limit_bytes > 0).then_some(self.memory_limit_bytes)
    }
}

fn hardware_threads() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn hardware_parallel_threshold() -> usize {
    if hardware_threads() > 1 {
        DEFAULT_PARALLEL_THRESHOLD
    } else {
        usize::MAX
    }
}
