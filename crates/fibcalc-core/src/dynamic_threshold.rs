//! Threshold policies: static snapshots and runtime-adaptive tuning.
//!
//! The orchestrator asks its policy for a `Thresholds` snapshot before each
//! doubling step and reports the step's timing afterwards. Snapshots are
//! immutable; an adaptive policy only ever hands out a new one between
//! steps.

use std::collections::VecDeque;

use crate::options::Options;
use crate::strategy::{MulTier, Thresholds};
use crate::threshold_types::{
    DynamicThresholdConfig, IterationMetric, StepTiming, ThresholdAdjustment, ThresholdSnapshot,
    ThresholdStats,
};

const FFT_FLOOR: usize = 1024;
const PARALLEL_FLOOR: usize = 512;
const STRASSEN_FLOOR: usize = 512;
const HISTORY_LEN: usize = 64;

/// Steps within this factor below a threshold count as evidence about it.
const NEAR_FACTOR: usize = 4;

/// Source of the thresholds used by one calculation.
pub trait ThresholdPolicy: Send {
    /// Thresholds for the next step.
    fn current(&self) -> Thresholds;

    /// Feed back the timing of a finished step.
    fn observe(&mut self, step: &StepTiming);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Policy that never changes its thresholds.
#[derive(Debug, Clone, Copy)]
pub struct StaticThresholds(pub Thresholds);

impl ThresholdPolicy for StaticThresholds {
    fn current(&self) -> Thresholds {
        self.0
    }

    fn observe(&mut self, _step: &StepTiming) {}

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Policy selected by the options.
#[must_use]
pub fn policy_for(opts: &Options) -> Box<dyn ThresholdPolicy> {
    let thresholds = Thresholds::from_options(opts);
    if opts.adaptive_thresholds {
        Box::new(AdaptiveThresholds::new(thresholds))
    } else {
        Box::new(StaticThresholds(thresholds))
    }
}

/// Manager for dynamically adjusting multiplication thresholds.
///
/// Keeps a ring buffer of metrics and nudges each threshold by at most
/// `max_adjustment` per cycle, only when the averaged evidence clears both
/// the hysteresis band and the dead zone.
pub struct DynamicThresholdManager {
    config: DynamicThresholdConfig,
    metrics: Vec<IterationMetric>,
    ring_pos: usize,
    ring_full: bool,
    initial: Thresholds,
    current: Thresholds,
    adjustment_count: usize,
    adjustment_history: VecDeque<ThresholdAdjustment>,
}

impl DynamicThresholdManager {
    /// Create a manager starting from the default thresholds.
    #[must_use]
    pub fn new(config: DynamicThresholdConfig) -> Self {
        Self::with_thresholds(config, Thresholds::default())
    }

    /// Create a manager starting from `initial`.
    #[must_use]
    pub fn with_thresholds(config: DynamicThresholdConfig, initial: Thresholds) -> Self {
        let ring_size = config.ring_buffer_size.max(1);
        Self {
            config: DynamicThresholdConfig {
                ring_buffer_size: ring_size,
                ..config
            },
            metrics: Vec::with_capacity(ring_size),
            ring_pos: 0,
            ring_full: false,
            initial,
            current: initial,
            adjustment_count: 0,
            adjustment_history: VecDeque::new(),
        }
    }

    /// Record a metric from an iteration.
    pub fn record(&mut self, metric: IterationMetric) {
        let ring_size = self.config.ring_buffer_size;
        if self.metrics.len() < ring_size {
            self.metrics.push(metric);
        } else {
            self.metrics[self.ring_pos] = metric;
            self.ring_full = true;
        }
        self.ring_pos = (self.ring_pos + 1) % ring_size;
    }

    /// Get the number of recorded metrics.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Adjust thresholds based on collected metrics.
    pub fn adjust(&mut self) {
        let Some(stats) = self.stats() else {
            return;
        };

        if let Some(next) = self.nudge(self.current.fft, stats.fft_benefit, FFT_FLOOR) {
            self.apply("fft", next, stats.fft_benefit);
        }
        if let Some(next) = self.nudge(self.current.parallel, stats.parallel_benefit, PARALLEL_FLOOR)
        {
            self.apply("parallel", next, stats.parallel_benefit);
        }
        if let Some(next) = self.nudge(self.current.strassen, stats.strassen_benefit, STRASSEN_FLOOR)
        {
            self.apply("strassen", next, stats.strassen_benefit);
        }
    }

    /// New value for a threshold, or `None` when the evidence is too weak.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn nudge(&self, current: usize, benefit: Option<f64>, floor: usize) -> Option<usize> {
        let benefit = benefit?;
        if benefit.abs() <= self.config.dead_zone {
            return None;
        }
        let factor = if benefit > self.config.hysteresis_factor {
            (1.0 - self.config.max_adjustment).max(0.5)
        } else if benefit < -self.config.hysteresis_factor {
            (1.0 + self.config.max_adjustment).min(2.0)
        } else {
            return None;
        };
        // Float to int casts saturate, so usize::MAX stays put.
        let next = ((current as f64) * factor) as usize;
        let next = next.max(floor);
        (next != current).then_some(next)
    }

    fn apply(&mut self, name: &str, new: usize, benefit: Option<f64>) {
        let slot = match name {
            "fft" => &mut self.current.fft,
            "parallel" => &mut self.current.parallel,
            _ => &mut self.current.strassen,
        };
        let old = std::mem::replace(slot, new);
        self.adjustment_count += 1;
        self.adjustment_history.push_back(ThresholdAdjustment {
            threshold_name: name.to_string(),
            old_value: old,
            new_value: new,
            trigger_benefit: benefit.unwrap_or_default(),
        });
        if self.adjustment_history.len() > HISTORY_LEN {
            self.adjustment_history.pop_front();
        }
    }

    /// Get computed statistics from the current metrics buffer.
    #[must_use]
    pub fn stats(&self) -> Option<ThresholdStats> {
        if self.metrics.is_empty() {
            return None;
        }
        Some(ThresholdStats {
            fft_benefit: mean(self.metrics.iter().filter_map(|m| m.fft_speedup)),
            parallel_benefit: mean(self.metrics.iter().filter_map(|m| m.parallel_speedup)),
            strassen_benefit: mean(self.metrics.iter().filter_map(|m| m.strassen_speedup)),
            sample_count: self.metrics.len(),
        })
    }

    /// Current thresholds.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.current
    }

    /// Get a serializable snapshot of current thresholds and history.
    #[must_use]
    pub fn snapshot(&self) -> ThresholdSnapshot {
        ThresholdSnapshot {
            parallel_threshold: self.current.parallel,
            fft_threshold: self.current.fft,
            strassen_threshold: self.current.strassen,
            adjustment_count: self.adjustment_count,
            adjustment_history: self.adjustment_history.iter().cloned().collect(),
        }
    }

    /// Return to the initial thresholds and clear all metrics.
    pub fn reset(&mut self) {
        self.metrics.clear();
        self.ring_pos = 0;
        self.ring_full = false;
        self.current = self.initial;
        self.adjustment_count = 0;
        self.adjustment_history.clear();
    }

    /// Whether the ring buffer has wrapped around at least once.
    #[must_use]
    pub fn is_ring_full(&self) -> bool {
        self.ring_full
    }

    /// Number of threshold adjustments made so far.
    #[must_use]
    pub fn adjustment_count(&self) -> usize {
        self.adjustment_count
    }

    /// Set thresholds directly.
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.current = thresholds;
    }
}

impl Default for DynamicThresholdManager {
    fn default() -> Self {
        Self::new(DynamicThresholdConfig::default())
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Growth exponent of a step's cost in the operand size, per tier.
fn cost_exponent(tier: MulTier) -> f64 {
    match tier {
        MulTier::Schoolbook => 2.0,
        MulTier::Karatsuba => 1.584_962_500_721_156,
        MulTier::Fft => 1.1,
    }
}

fn near_below(bits: usize, threshold: usize) -> bool {
    bits <= threshold && bits.saturating_mul(NEAR_FACTOR) >= threshold
}

/// Turn two consecutive steps into threshold evidence.
///
/// The later step's cost is compared with what it would have cost had it
/// grown like the earlier step's tier. When the later step switched to a
/// faster path, a cheaper-than-predicted step argues for switching earlier.
/// When both stayed native just below the FFT threshold, a step that grew
/// faster than Karatsuba predicts argues the same for the FFT.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn metric_from_steps(
    prev: &StepTiming,
    cur: &StepTiming,
    thresholds: &Thresholds,
) -> Option<IterationMetric> {
    if prev.bits == 0 || cur.bits <= prev.bits || prev.duration.is_zero() {
        return None;
    }
    let growth = cur.bits as f64 / prev.bits as f64;
    let observed = cur.duration.as_secs_f64() / prev.duration.as_secs_f64();
    let predicted = growth.powf(cost_exponent(prev.tier));
    let relative = ((predicted - observed) / predicted).clamp(-1.0, 1.0);

    let fft_speedup = match (prev.tier, cur.tier) {
        (MulTier::Fft, _) => None,
        (_, MulTier::Fft) => Some(relative),
        (MulTier::Karatsuba, MulTier::Karatsuba) if near_below(cur.bits, thresholds.fft) => {
            Some(-relative)
        }
        _ => None,
    };
    let parallel_speedup = (!prev.parallel && cur.parallel).then_some(relative);
    let strassen_speedup =
        (prev.tier == MulTier::Schoolbook && cur.tier == MulTier::Karatsuba).then_some(relative);

    if fft_speedup.is_none() && parallel_speedup.is_none() && strassen_speedup.is_none() {
        return None;
    }
    Some(IterationMetric {
        bit_length: cur.bits,
        fft_speedup,
        parallel_speedup,
        strassen_speedup,
        duration_ns: cur.duration.as_nanos() as u64,
        tier: cur.tier,
    })
}

/// Policy that tunes its thresholds from the timings of the running
/// calculation.
pub struct AdaptiveThresholds {
    manager: DynamicThresholdManager,
    previous: Option<StepTiming>,
}

impl AdaptiveThresholds {
    /// Adaptive policy starting from `initial`.
    #[must_use]
    pub fn new(initial: Thresholds) -> Self {
        Self::with_config(DynamicThresholdConfig::default(), initial)
    }

    /// Adaptive policy with explicit tuning parameters.
    #[must_use]
    pub fn with_config(config: DynamicThresholdConfig, initial: Thresholds) -> Self {
        Self {
            manager: DynamicThresholdManager::with_thresholds(config, initial),
            previous: None,
        }
    }

    /// Snapshot of the underlying manager.
    #[must_use]
    pub fn snapshot(&self) -> ThresholdSnapshot {
        self.manager.snapshot()
    }
}

impl ThresholdPolicy for AdaptiveThresholds {
    fn current(&self) -> Thresholds {
        self.manager.thresholds()
    }

    fn observe(&mut self, step: &StepTiming) {
        let Some(prev) = self.previous.replace(*step) else {
            return;
        };
        let before = self.manager.thresholds();
        if let Some(metric) = metric_from_steps(&prev, step, &before) {
            self.manager.record(metric);
            self.manager.adjust();
            let after = self.manager.thresholds();
            if after != before {
                tracing::debug!(
                    bits = step.bits,
                    fft = after.fft,
                    parallel = after.parallel,
                    strassen = after.strassen,
                    "thresholds adjusted"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "adaptive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_metric(bit_length: usize, fft_speedup: f64, parallel_speedup: f64) -> IterationMetric {
        IterationMetric::basic(bit_length, fft_speedup, parallel_speedup, 1_000_000)
    }

    fn step(bits: usize, tier: MulTier, parallel: bool, micros: u64) -> StepTiming {
        StepTiming {
            bits,
            tier,
            parallel,
            duration: Duration::from_micros(micros),
        }
    }

    #[test]
    fn default_thresholds() {
        let mgr = DynamicThresholdManager::default();
        assert_eq!(mgr.thresholds(), Thresholds::default());
    }

    #[test]
    fn record_and_adjust() {
        let mut mgr = DynamicThresholdManager::default();
        mgr.record(make_metric(1000, 0.2, 0.1));
        mgr.adjust();
        assert!(mgr.thresholds().fft < Thresholds::default().fft);
        assert!(mgr.thresholds().parallel < Thresholds::default().parallel);
        // No Karatsuba evidence, no Karatsuba change.
        assert_eq!(mgr.thresholds().strassen, Thresholds::default().strassen);
    }

    #[test]
    fn ring_buffer_wrapping() {
        let config = DynamicThresholdConfig {
            ring_buffer_size: 4,
            ..DynamicThresholdConfig::default()
        };
        let mut mgr = DynamicThresholdManager::new(config);

        for i in 0..4 {
            mgr.record(make_metric(1000 + i * 100, 0.1, 0.1));
        }
        assert_eq!(mgr.metric_count(), 4);
        assert!(!mgr.is_ring_full());

        mgr.record(make_metric(2000, 0.1, 0.1));
        assert_eq!(mgr.metric_count(), 4);
        assert!(mgr.is_ring_full());
    }

    #[test]
    fn hysteresis_dead_zone() {
        let config = DynamicThresholdConfig {
            ring_buffer_size: 8,
            hysteresis_factor: 0.1,
            max_adjustment: 0.1,
            dead_zone: 0.05,
        };
        let mut mgr = DynamicThresholdManager::new(config);

        for _ in 0..4 {
            mgr.record(make_metric(1000, 0.01, 0.01));
        }
        mgr.adjust();
        assert_eq!(mgr.thresholds(), Thresholds::default());
        assert_eq!(mgr.adjustment_count(), 0);

        // Outside the dead zone but inside the hysteresis band.
        mgr.reset();
        for _ in 0..4 {
            mgr.record(make_metric(1000, 0.08, -0.08));
        }
        mgr.adjust();
        assert_eq!(mgr.adjustment_count(), 0);
    }

    #[test]
    fn negative_benefit_increases_threshold() {
        let mut mgr = DynamicThresholdManager::default();
        for _ in 0..4 {
            mgr.record(make_metric(1000, -0.2, -0.2));
        }
        mgr.adjust();
        assert!(mgr.thresholds().fft > Thresholds::default().fft);
        assert!(mgr.thresholds().parallel > Thresholds::default().parallel);
    }

    #[test]
    fn strassen_threshold_adjustment() {
        let mut mgr = DynamicThresholdManager::default();
        let mut metric = make_metric(2000, 0.0, 0.0);
        metric.strassen_speedup = Some(0.3);
        for _ in 0..8 {
            mgr.record(metric.clone());
        }
        mgr.adjust();
        assert!(mgr.thresholds().strassen < Thresholds::default().strassen);
    }

    #[test]
    fn snapshot_and_reset() {
        let initial = Thresholds {
            parallel: 2048,
            fft: 250_000,
            strassen: 1536,
        };
        let mut mgr = DynamicThresholdManager::with_thresholds(
            DynamicThresholdConfig::default(),
            initial,
        );
        mgr.record(make_metric(1000, 0.2, 0.1));
        mgr.adjust();

        let snap = mgr.snapshot();
        assert_eq!(snap.fft_threshold, mgr.thresholds().fft);
        assert_eq!(snap.adjustment_count, 2);
        assert_eq!(snap.adjustment_history[0].threshold_name, "fft");
        assert_eq!(snap.adjustment_history[0].old_value, 250_000);

        mgr.reset();
        assert_eq!(mgr.thresholds(), initial);
        assert_eq!(mgr.metric_count(), 0);
        assert!(mgr.stats().is_none());
    }

    #[test]
    fn stats_with_data() {
        let mut mgr = DynamicThresholdManager::default();
        mgr.record(make_metric(1000, 0.2, 0.1));
        mgr.record(make_metric(2000, 0.4, 0.3));

        let stats = mgr.stats().unwrap();
        assert_eq!(stats.sample_count, 2);
        assert!((stats.fft_benefit.unwrap() - 0.3).abs() < 1e-12);
        assert!((stats.parallel_benefit.unwrap() - 0.2).abs() < 1e-12);
        assert!(stats.strassen_benefit.is_none());
    }

    #[test]
    fn floor_prevents_collapse() {
        let config = DynamicThresholdConfig {
            ring_buffer_size: 4,
            hysteresis_factor: 0.01,
            max_adjustment: 0.5,
            dead_zone: 0.005,
        };
        let mut mgr = DynamicThresholdManager::new(config);
        mgr.set_thresholds(Thresholds {
            parallel: 1024,
            fft: 1024,
            strassen: 1024,
        });

        for _ in 0..20 {
            let mut metric = make_metric(2000, 0.9, 0.9);
            metric.strassen_speedup = Some(0.9);
            mgr.record(metric);
            mgr.adjust();
        }
        let t = mgr.thresholds();
        assert_eq!(t.fft, FFT_FLOOR);
        assert_eq!(t.parallel, PARALLEL_FLOOR);
        assert_eq!(t.strassen, STRASSEN_FLOOR);
    }

    #[test]
    fn history_is_bounded() {
        let mut mgr = DynamicThresholdManager::default();
        for i in 0..100 {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            mgr.reset_metrics_for_test();
            mgr.record(make_metric(1000, 0.5 * sign, 0.5 * sign));
            mgr.adjust();
        }
        assert_eq!(mgr.adjustment_count(), 200);
        assert_eq!(mgr.snapshot().adjustment_history.len(), HISTORY_LEN);
    }

    impl DynamicThresholdManager {
        fn reset_metrics_for_test(&mut self) {
            self.metrics.clear();
            self.ring_pos = 0;
        }
    }

    #[test]
    fn metric_from_fft_crossing() {
        let t = Thresholds::default();
        // Doubling the size only tripled the time: better than Karatsuba's 3x.
        let prev = step(400_000, MulTier::Karatsuba, true, 1000);
        let cur = step(800_000, MulTier::Fft, true, 2000);
        let m = metric_from_steps(&prev, &cur, &t).unwrap();
        assert!(m.fft_speedup.unwrap() > 0.3);
        assert!(m.parallel_speedup.is_none());
        assert!(m.strassen_speedup.is_none());
        assert_eq!(m.tier, MulTier::Fft);
    }

    #[test]
    fn metric_from_native_steps_near_fft() {
        let t = Thresholds::default();
        // Native step growing 4x for 2x bits: FFT should start earlier.
        let prev = step(200_000, MulTier::Karatsuba, true, 1000);
        let cur = step(400_000, MulTier::Karatsuba, true, 4000);
        let m = metric_from_steps(&prev, &cur, &t).unwrap();
        assert!(m.fft_speedup.unwrap() > 0.0);

        // Far below the threshold the pair says nothing.
        let prev = step(2_000, MulTier::Karatsuba, true, 10);
        let cur = step(4_000, MulTier::Karatsuba, true, 40);
        assert!(metric_from_steps(&prev, &cur, &t).is_none());
    }

    #[test]
    fn metric_from_parallel_and_karatsuba_crossings() {
        let t = Thresholds::default();
        let prev = step(2_000, MulTier::Schoolbook, false, 100);
        let cur = step(4_000, MulTier::Karatsuba, true, 150);
        let m = metric_from_steps(&prev, &cur, &t).unwrap();
        assert!(m.parallel_speedup.unwrap() > 0.0);
        assert!(m.strassen_speedup.unwrap() > 0.0);
        assert!(m.fft_speedup.is_none());
    }

    #[test]
    fn metric_rejects_degenerate_pairs() {
        let t = Thresholds::default();
        let a = step(1000, MulTier::Schoolbook, false, 0);
        let b = step(2000, MulTier::Karatsuba, true, 10);
        assert!(metric_from_steps(&a, &b, &t).is_none());
        assert!(metric_from_steps(&b, &b, &t).is_none());
    }

    #[test]
    fn static_policy_never_moves() {
        let mut policy = StaticThresholds(Thresholds::default());
        policy.observe(&step(400_000, MulTier::Karatsuba, true, 1000));
        policy.observe(&step(800_000, MulTier::Fft, true, 1));
        assert_eq!(policy.current(), Thresholds::default());
        assert_eq!(policy.name(), "static");
    }

    #[test]
    fn adaptive_policy_lowers_fft_after_cheap_crossing() {
        let mut policy = AdaptiveThresholds::new(Thresholds::default());
        policy.observe(&step(400_000, MulTier::Karatsuba, true, 1000));
        assert_eq!(policy.current(), Thresholds::default());
        policy.observe(&step(800_000, MulTier::Fft, true, 1500));
        assert!(policy.current().fft < Thresholds::default().fft);
        assert_eq!(policy.snapshot().adjustment_count, 1);
        assert_eq!(policy.name(), "adaptive");
    }

    #[test]
    fn policy_for_options() {
        let opts = Options::default();
        assert_eq!(policy_for(&opts).name(), "static");
        let opts = Options {
            adaptive_thresholds: true,
            ..Options::default()
        };
        let policy = policy_for(&opts);
        assert_eq!(policy.name(), "adaptive");
        assert_eq!(policy.current(), Thresholds::from_options(&opts));
    }
}
