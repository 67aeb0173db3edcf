//! Types for dynamic threshold management.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::strategy::MulTier;

/// What the orchestrator observed for one doubling step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTiming {
    /// Bit length of F(k+1) going into the step.
    pub bits: usize,
    /// Tier the squarings of the step ran on.
    pub tier: MulTier,
    /// Whether the three products ran concurrently.
    pub parallel: bool,
    /// Wall time of the three products and the combine.
    pub duration: Duration,
}

/// Metric derived from a pair of consecutive steps.
///
/// A speedup is `Some` only when the pair says something about that
/// threshold; positive means the faster path should start earlier.
#[derive(Debug, Clone)]
pub struct IterationMetric {
    /// Bit length of operands in the later step.
    pub bit_length: usize,
    /// Evidence about the FFT threshold.
    pub fft_speedup: Option<f64>,
    /// Evidence about the parallel threshold.
    pub parallel_speedup: Option<f64>,
    /// Evidence about the Karatsuba threshold.
    pub strassen_speedup: Option<f64>,
    /// Duration of the later step in nanoseconds.
    pub duration_ns: u64,
    /// Tier of the later step.
    pub tier: MulTier,
}

impl IterationMetric {
    /// Create a metric carrying FFT and parallel evidence only.
    #[must_use]
    pub fn basic(
        bit_length: usize,
        fft_speedup: f64,
        parallel_speedup: f64,
        duration_ns: u64,
    ) -> Self {
        Self {
            bit_length,
            fft_speedup: Some(fft_speedup),
            parallel_speedup: Some(parallel_speedup),
            strassen_speedup: None,
            duration_ns,
            tier: MulTier::Karatsuba,
        }
    }
}

/// Aggregated statistics for threshold adjustment.
#[derive(Debug, Clone)]
pub struct ThresholdStats {
    /// Average FFT benefit (positive = FFT is better), if any sample has one.
    pub fft_benefit: Option<f64>,
    /// Average parallel benefit.
    pub parallel_benefit: Option<f64>,
    /// Average Karatsuba benefit.
    pub strassen_benefit: Option<f64>,
    /// Number of samples.
    pub sample_count: usize,
}

/// Serializable snapshot of the current threshold state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSnapshot {
    /// Current parallel threshold.
    pub parallel_threshold: usize,
    /// Current FFT threshold.
    pub fft_threshold: usize,
    /// Current Karatsuba threshold.
    pub strassen_threshold: usize,
    /// Number of adjustments made.
    pub adjustment_count: usize,
    /// Most recent adjustments, oldest first.
    pub adjustment_history: Vec<ThresholdAdjustment>,
}

/// Record of a single threshold adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdAdjustment {
    /// Which threshold was adjusted.
    pub threshold_name: String,
    /// Old value.
    pub old_value: usize,
    /// New value.
    pub new_value: usize,
    /// Benefit metric that triggered the adjustment.
    pub trigger_benefit: f64,
}

/// Configuration for the `DynamicThresholdManager`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicThresholdConfig {
    /// Size of the ring buffer for metrics.
    pub ring_buffer_size: usize,
    /// Hysteresis factor: minimum benefit to trigger adjustment.
    pub hysteresis_factor: f64,
    /// Maximum adjustment per cycle (as a fraction).
    pub max_adjustment: f64,
    /// Dead zone: benefit values within this range cause no adjustment.
    pub dead_zone: f64,
}

impl Default for DynamicThresholdConfig {
    fn default() -> Self {
        Self {
            ring_buffer_size: 32,
            hysteresis_factor: 0.05,
            max_adjustment: 0.1,
            dead_zone: 0.02,
        }
    }
}
