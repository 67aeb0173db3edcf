//! Memory budget estimation and validation.
//!
//! The estimate runs before anything is allocated, so a calculation that
//! cannot fit is refused up front instead of failing halfway.

use fibcalc_bigfft::memory_est::estimate_fft_sqr_memory;
use fibcalc_memory::WORD_BITS;

use crate::calculator::FibError;
use crate::constants::LOG2_PHI;
use crate::options::Options;

/// Peak memory estimate for a Fibonacci computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEstimate {
    /// Bits of F(n).
    pub result_bits: u64,
    /// The five doubling slots.
    pub state_bytes: u64,
    /// Transform vectors of the three concurrent products in the last step.
    pub fft_bytes: u64,
    /// Transforms the cache may retain for operands of this size.
    pub cache_bytes: u64,
    /// Allocator slack and pool headroom.
    pub overhead_bytes: u64,
    /// Sum of the above.
    pub total_bytes: u64,
}

/// Slots in the doubling state.
const STATE_SLOTS: u64 = 5;

/// Cached transforms counted against the budget.
const BUDGETED_CACHE_ENTRIES: u64 = 4;

impl MemoryEstimate {
    /// Estimate with the default thresholds and cache settings.
    #[must_use]
    pub fn estimate(n: u64) -> Self {
        Self::estimate_with(n, &Options::default())
    }

    /// Estimate for the thresholds and cache settings in `opts`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn estimate_with(n: u64, opts: &Options) -> Self {
        let result_bits = ((n as f64) * LOG2_PHI).ceil() as u64;
        let slot_bytes = result_bits
            .div_ceil(WORD_BITS as u64)
            .saturating_add(4)
            .saturating_mul(8);
        let state_bytes = slot_bytes.saturating_mul(STATE_SLOTS);

        // The last step squares operands of about half the result.
        let half_bits = usize::try_from(result_bits / 2).unwrap_or(usize::MAX);
        let one_transform = if half_bits > opts.fft_threshold {
            u64::try_from(estimate_fft_sqr_memory(half_bits)).unwrap_or(u64::MAX)
        } else {
            0
        };
        let fft_bytes = one_transform.saturating_mul(3);

        let cache = &opts.transform_cache;
        let cache_bytes = if cache.enabled && one_transform > 0 && half_bits >= cache.min_bit_len {
            let entries = BUDGETED_CACHE_ENTRIES.min(cache.max_entries as u64);
            // A cached transform is one of the three vectors of a squaring.
            entries.saturating_mul(one_transform / 3)
        } else {
            0
        };

        let subtotal = state_bytes
            .saturating_add(fft_bytes)
            .saturating_add(cache_bytes);
        let overhead_bytes = subtotal / 10;
        Self {
            result_bits,
            state_bytes,
            fft_bytes,
            cache_bytes,
            overhead_bytes,
            total_bytes: subtotal.saturating_add(overhead_bytes),
        }
    }

    /// Check if the computation fits within the given memory limit.
    ///
    /// `None` means unlimited (always fits).
    #[must_use]
    pub fn fits_in(&self, limit: Option<u64>) -> bool {
        limit.map_or(true, |l| self.total_bytes <= l)
    }

    /// `ResourceExhausted` when the estimate exceeds `limit`.
    pub fn check(&self, limit: Option<u64>) -> Result<(), FibError> {
        match limit {
            Some(limit) if !self.fits_in(Some(limit)) => Err(FibError::ResourceExhausted {
                required: self.total_bytes,
                limit,
            }),
            _ => Ok(()),
        }
    }
}

/// Parse a memory limit string (e.g., "8G", "512M", "1024K").
///
/// An empty string means unlimited and parses to 0.
pub fn parse_memory_limit(s: &str) -> Result<u64, FibError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }

    let upper = s.to_ascii_uppercase();
    let body = upper.strip_suffix("IB").unwrap_or(&upper);
    let body = if body.len() > 1 {
        body.strip_suffix('B').unwrap_or(body)
    } else {
        body
    };
    let (num_str, multiplier) = if let Some(n) = body.strip_suffix('T') {
        (n, 1u64 << 40)
    } else if let Some(n) = body.strip_suffix('G') {
        (n, 1 << 30)
    } else if let Some(n) = body.strip_suffix('M') {
        (n, 1 << 20)
    } else if let Some(n) = body.strip_suffix('K') {
        (n, 1 << 10)
    } else {
        (body, 1)
    };

    let value: u64 = num_str
        .trim()
        .parse()
        .map_err(|e| FibError::Config(format!("invalid memory limit '{s}': {e}")))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| FibError::Config(format!("memory limit '{s}' overflows")))
}

/// Render a byte count with a binary unit, e.g. `1.50 GiB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_small() {
        let est = MemoryEstimate::estimate(100);
        assert_eq!(est.result_bits, 70);
        assert_eq!(est.fft_bytes, 0);
        assert_eq!(est.cache_bytes, 0);
        assert!(est.total_bytes >= est.state_bytes);
    }

    #[test]
    fn estimate_large() {
        let est = MemoryEstimate::estimate(10_000_000);
        // F(10M) has about 6.94M bits, 868 KB per slot.
        assert!(est.result_bits > 6_900_000);
        assert!(est.state_bytes > 5 * 860_000);
        assert!(est.fft_bytes > 0);
        assert!(est.total_bytes > est.state_bytes + est.fft_bytes);
    }

    #[test]
    fn estimate_max_index_saturates() {
        let est = MemoryEstimate::estimate(u64::MAX);
        assert!(est.result_bits > 1 << 63);
        assert!(est.total_bytes >= est.state_bytes);
        assert!(est.total_bytes > 1 << 40);
        assert!(!est.fits_in(Some(1 << 30)));
    }

    #[test]
    fn fft_only_above_threshold() {
        // ~69k result bits: half is far below the default FFT threshold.
        let est = MemoryEstimate::estimate(100_000);
        assert_eq!(est.fft_bytes, 0);

        let opts = Options {
            fft_threshold: 10_000,
            ..Options::default()
        };
        let est = MemoryEstimate::estimate_with(100_000, &opts);
        assert!(est.fft_bytes > 0);
    }

    #[test]
    fn disabled_cache_costs_nothing() {
        let mut opts = Options::default();
        let with_cache = MemoryEstimate::estimate_with(10_000_000, &opts);
        opts.transform_cache.enabled = false;
        let without = MemoryEstimate::estimate_with(10_000_000, &opts);
        assert!(with_cache.cache_bytes > 0);
        assert_eq!(without.cache_bytes, 0);
        assert!(without.total_bytes < with_cache.total_bytes);
    }

    #[test]
    fn fits_in_and_check() {
        let est = MemoryEstimate::estimate(100_000_000);
        assert!(est.fits_in(None));
        assert!(est.check(None).is_ok());
        assert!(!est.fits_in(Some(1024)));
        assert_eq!(
            est.check(Some(1024)),
            Err(FibError::ResourceExhausted {
                required: est.total_bytes,
                limit: 1024
            })
        );
        assert!(est.check(Some(est.total_bytes)).is_ok());
    }

    #[test]
    fn parse_memory_limit_values() {
        assert_eq!(parse_memory_limit("8G").unwrap(), 8 << 30);
        assert_eq!(parse_memory_limit("512M").unwrap(), 512 << 20);
        assert_eq!(parse_memory_limit("1024K").unwrap(), 1 << 20);
        assert_eq!(parse_memory_limit("2GiB").unwrap(), 2 << 30);
        assert_eq!(parse_memory_limit("64mb").unwrap(), 64 << 20);
        assert_eq!(parse_memory_limit("100B").unwrap(), 100);
        assert_eq!(parse_memory_limit("4096").unwrap(), 4096);
        assert_eq!(parse_memory_limit("").unwrap(), 0);
    }

    #[test]
    fn parse_memory_limit_invalid() {
        assert!(matches!(parse_memory_limit("abc"), Err(FibError::Config(_))));
        assert!(parse_memory_limit("-1G").is_err());
        assert!(parse_memory_limit("99999999999T").is_err());
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(3 << 30), "3.00 GiB");
    }
}
