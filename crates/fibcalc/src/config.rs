//! Application configuration from CLI flags and environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use fibcalc_core::memory_budget::parse_memory_limit;
use fibcalc_core::options::{GcMode, Options};

/// fibcalc: exact Fibonacci numbers for very large indices.
#[derive(Parser, Debug)]
#[command(name = "fibcalc", version, about)]
#[allow(clippy::struct_excessive_bools)]
pub struct AppConfig {
    /// Index of the Fibonacci number to compute.
    #[arg(short, long, default_value = "1000", env = "FIBCALC_N")]
    pub n: u64,

    /// Print the value itself, not just its summary.
    #[arg(short, long)]
    pub calculate: bool,

    /// Compute only the last K decimal digits (0 = the full value).
    #[arg(long, default_value = "0", env = "FIBCALC_LAST_DIGITS")]
    pub last_digits: u32,

    /// Deadline for the calculation (e.g. "5m", "30s", "500ms").
    #[arg(long, default_value = "5m", env = "FIBCALC_TIMEOUT", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Pool eviction policy during the run: auto, aggressive or disabled.
    #[arg(long, default_value = "auto", env = "FIBCALC_GC_MODE")]
    pub gc_mode: GcMode,

    /// Memory limit (e.g. "8G", "512M"; 0 = unlimited).
    #[arg(long, default_value = "0", env = "FIBCALC_MEMORY_LIMIT", value_parser = parse_memory_limit)]
    pub memory_limit: u64,

    /// Parallel multiplication threshold in bits (0 = hardware default).
    #[arg(long, default_value = "0")]
    pub threshold: usize,

    /// FFT multiplication threshold in bits (0 = default).
    #[arg(long, default_value = "0")]
    pub fft_threshold: usize,

    /// Karatsuba multiplication threshold in bits (0 = default).
    #[arg(long, default_value = "0")]
    pub strassen_threshold: usize,

    /// Let observed step timings move the thresholds during the run.
    #[arg(long)]
    pub adaptive: bool,

    /// Disable the FFT transform cache.
    #[arg(long)]
    pub no_transform_cache: bool,

    /// Log progress while computing.
    #[arg(short, long)]
    pub verbose: bool,

    /// Show size, timing and memory details.
    #[arg(short, long)]
    pub details: bool,

    /// Write the value to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Quiet mode (only output the number).
    #[arg(short, long)]
    pub quiet: bool,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Calculation options carried by the flags, normalized.
    #[must_use]
    pub fn options(&self) -> Options {
        let mut opts = Options {
            parallel_threshold: self.threshold,
            fft_threshold: self.fft_threshold,
            strassen_threshold: self.strassen_threshold,
            gc_mode: self.gc_mode,
            memory_limit_bytes: self.memory_limit,
            adaptive_thresholds: self.adaptive,
            ..Options::default()
        };
        if self.no_transform_cache {
            opts.transform_cache.enabled = false;
        }
        opts.normalize()
    }
}

/// Parse a duration string like "5m", "1h", "30s" or "500ms".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let invalid = |e: std::num::ParseIntError| format!("invalid duration '{s}': {e}");
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse().map(Duration::from_millis).map_err(invalid)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse().map(Duration::from_secs).map_err(invalid)
    } else if let Some(mins) = s.strip_suffix('m') {
        let n: u64 = mins.trim().parse().map_err(invalid)?;
        Ok(Duration::from_secs(n.saturating_mul(60)))
    } else if let Some(hours) = s.strip_suffix('h') {
        let n: u64 = hours.trim().parse().map_err(invalid)?;
        Ok(Duration::from_secs(n.saturating_mul(3600)))
    } else {
        s.parse().map(Duration::from_secs).map_err(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_formats() {
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("45"), Ok(Duration::from_secs(45)));
    }

    #[test]
    fn parse_duration_ms() {
        assert_eq!(parse_duration("1ms"), Ok(Duration::from_millis(1)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn flags_map_to_options() {
        let config = AppConfig::try_parse_from([
            "fibcalc",
            "-n",
            "500",
            "--gc-mode",
            "aggressive",
            "--memory-limit",
            "512M",
            "--fft-threshold",
            "100000",
            "--no-transform-cache",
            "--adaptive",
        ])
        .unwrap();
        let opts = config.options();
        assert_eq!(config.n, 500);
        assert_eq!(opts.gc_mode, GcMode::Aggressive);
        assert_eq!(opts.memory_limit_bytes, 512 << 20);
        assert_eq!(opts.fft_threshold, 100_000);
        assert!(!opts.transform_cache.enabled);
        assert!(opts.adaptive_thresholds);
    }

    #[test]
    fn defaults() {
        let config = AppConfig::try_parse_from(["fibcalc"]).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.last_digits, 0);
        assert_eq!(config.options().memory_limit(), None);
    }

    #[test]
    fn bad_gc_mode_is_rejected() {
        assert!(AppConfig::try_parse_from(["fibcalc", "--gc-mode", "never"]).is_err());
    }
}
