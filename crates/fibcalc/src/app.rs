//! Application entry point and dispatch.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use num_bigint::BigUint;
use tracing::info;

use fibcalc_core::memory_budget::{format_bytes, MemoryEstimate};
use fibcalc_core::observer::ProgressObserver;
use fibcalc_core::observers::{LoggingObserver, NoOpObserver};
use fibcalc_core::progress::CancellationToken;
use fibcalc_core::{calculate, calculate_last_digits};

use crate::config::AppConfig;

/// Minimum time between two logged progress lines in verbose mode.
const PROGRESS_LOG_INTERVAL_MS: u64 = 500;

/// A computed value ready for display.
#[derive(Debug)]
pub struct Outcome {
    /// The full value, or its last digits.
    pub value: BigUint,
    /// Digits requested in last-digits mode, 0 otherwise.
    pub last_digits: u32,
    /// Wall time of the calculation.
    pub duration: Duration,
}

impl Outcome {
    /// Decimal rendering; last-digits values keep their leading zeros.
    #[must_use]
    pub fn render(&self) -> String {
        let digits = self.value.to_string();
        if self.last_digits == 0 {
            digits
        } else {
            format!("{digits:0>width$}", width = self.last_digits as usize)
        }
    }
}

/// Run the application.
pub fn run(config: &AppConfig) -> Result<()> {
    let cancel = CancellationToken::with_deadline(config.timeout);
    install_ctrlc_handler(cancel.clone())?;

    let outcome = compute(config, &cancel)?;
    present(config, &outcome);

    if let Some(path) = &config.output {
        std::fs::write(path, outcome.render())
            .with_context(|| format!("writing result to {}", path.display()))?;
    }
    Ok(())
}

/// Compute F(n), or its last digits, as the flags ask.
pub fn compute(config: &AppConfig, cancel: &CancellationToken) -> Result<Outcome> {
    let verbose = LoggingObserver::new(PROGRESS_LOG_INTERVAL_MS);
    let silent = NoOpObserver::new();
    let observer: &dyn ProgressObserver = if config.verbose { &verbose } else { &silent };

    let started = Instant::now();
    let value = if config.last_digits > 0 {
        calculate_last_digits(config.n, config.last_digits, cancel, observer)
            .with_context(|| format!("computing the last {} digits of F({})", config.last_digits, config.n))?
    } else {
        let opts = config.options();
        let estimate = MemoryEstimate::estimate_with(config.n, &opts);
        info!(
            n = config.n,
            estimated = %format_bytes(estimate.total_bytes),
            "starting calculation"
        );
        calculate(config.n, &opts, cancel, observer)
            .with_context(|| format!("computing F({})", config.n))?
    };

    Ok(Outcome {
        value,
        last_digits: config.last_digits,
        duration: started.elapsed(),
    })
}

fn present(config: &AppConfig, outcome: &Outcome) {
    if config.quiet {
        println!("{}", outcome.render());
        return;
    }

    let rendered = outcome.render();
    if config.last_digits > 0 {
        println!("Last {} digits of F({}): {rendered}", config.last_digits, config.n);
    } else if config.calculate {
        println!("F({}) = {rendered}", config.n);
    } else {
        println!("F({}) has {} digits", config.n, rendered.len());
    }

    if config.details {
        println!("  bits:     {}", outcome.value.bits());
        println!("  digits:   {}", rendered.len());
        println!("  time:     {:.3?}", outcome.duration);
        if config.last_digits == 0 {
            let estimate = MemoryEstimate::estimate_with(config.n, &config.options());
            println!("  memory:   ~{}", format_bytes(estimate.total_bytes));
        }
    }
}

fn install_ctrlc_handler(cancel: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || cancel.cancel()).context("installing the Ctrl+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(args: &[&str]) -> AppConfig {
        let mut argv = vec!["fibcalc"];
        argv.extend_from_slice(args);
        AppConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn compute_full_value() {
        let cfg = config(&["-n", "100"]);
        let outcome = compute(&cfg, &CancellationToken::new()).unwrap();
        assert_eq!(outcome.render(), "354224848179261915075");
    }

    #[test]
    fn last_digits_keep_leading_zeros() {
        // F(10^9) mod 10^20 has 19 significant digits.
        let cfg = config(&["-n", "1000000000", "--last-digits", "20"]);
        let outcome = compute(&cfg, &CancellationToken::new()).unwrap();
        assert_eq!(outcome.render(), "03172326981560546875");
    }

    #[test]
    fn cancellation_surfaces_as_fib_error() {
        let cfg = config(&["-n", "100000"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = compute(&cfg, &cancel).unwrap_err();
        assert_eq!(crate::errors::exit_code(&err), 130);
    }

    #[test]
    fn memory_limit_surfaces_as_resource_error() {
        let cfg = config(&["-n", "100000000", "--memory-limit", "1K"]);
        let err = compute(&cfg, &CancellationToken::new()).unwrap_err();
        assert_eq!(crate::errors::exit_code(&err), 5);
    }
}
