//! Property-based tests for the Fibonacci calculators.
//!
//! Most properties run the core loop directly (no table fast path) with
//! small thresholds, so every multiplication tier is reached at modest n.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};
use proptest::prelude::*;

use fibcalc_core::calculator::CoreCalculator;
use fibcalc_core::fastdoubling::FastDoubling;
use fibcalc_core::modular::fibonacci_mod;
use fibcalc_core::observers::NoOpObserver;
use fibcalc_core::options::Options;
use fibcalc_core::progress::CancellationToken;

fn small_tiers() -> FastDoubling {
    FastDoubling::with_options(Options {
        parallel_threshold: 512,
        fft_threshold: 4096,
        strassen_threshold: 640,
        ..Options::default()
    })
}

fn compute_core(algo: &FastDoubling, n: u64) -> BigUint {
    let cancel = CancellationToken::new();
    let observer = NoOpObserver::new();
    algo.calculate_core(&cancel, &observer, n).unwrap()
}

fn reference(n: u64) -> BigUint {
    let (mut a, mut b) = (BigUint::zero(), BigUint::one());
    for _ in 0..n {
        let next = &a + &b;
        a = std::mem::replace(&mut b, next);
    }
    a
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// The doubling loop matches the additive recurrence.
    #[test]
    fn matches_reference_recurrence(n in 94u64..1000) {
        let algo = FastDoubling::default();
        prop_assert_eq!(compute_core(&algo, n), reference(n), "F({})", n);
    }

    /// F(n) + F(n+1) == F(n+2) for random n.
    #[test]
    fn fibonacci_addition_property(n in 94u64..20_000) {
        let algo = small_tiers();
        let fn_val = compute_core(&algo, n);
        let fn1_val = compute_core(&algo, n + 1);
        let fn2_val = compute_core(&algo, n + 2);
        prop_assert_eq!(&fn_val + &fn1_val, fn2_val, "F({}) + F({}) != F({})", n, n + 1, n + 2);
    }

    /// Cassini: F(n-1)*F(n+1) - F(n)^2 = (-1)^n.
    #[test]
    fn cassini_identity(n in 95u64..20_000) {
        let algo = small_tiers();
        let prev = BigInt::from(compute_core(&algo, n - 1));
        let cur = BigInt::from(compute_core(&algo, n));
        let next = BigInt::from(compute_core(&algo, n + 1));
        let expected = if n % 2 == 0 { BigInt::one() } else { -BigInt::one() };
        prop_assert_eq!(&prev * &next - &cur * &cur, expected, "Cassini at n={}", n);
    }

    /// F(2n) = F(n) * (2*F(n+1) - F(n)).
    #[test]
    fn doubling_identity(n in 94u64..10_000) {
        let algo = small_tiers();
        let fk = compute_core(&algo, n);
        let fk1 = compute_core(&algo, n + 1);
        let f2k = compute_core(&algo, 2 * n);
        prop_assert_eq!(&fk * ((&fk1 << 1u32) - &fk), f2k, "F(2*{})", n);
    }

    /// F(n) mod 10^k matches the modular calculator for random n, k.
    #[test]
    fn modular_matches_full_computation(n in 94u64..5000, k in 1u32..30) {
        let algo = FastDoubling::default();
        let full = compute_core(&algo, n);
        let modulus = BigUint::from(10u32).pow(k);
        let expected = &full % &modulus;

        let cancel = CancellationToken::new();
        let observer = NoOpObserver::new();
        let result = fibonacci_mod(n, &BigInt::from(modulus), &cancel, &observer).unwrap();

        prop_assert_eq!(result, expected, "F({}) mod 10^{} mismatch", n, k);
    }

    /// Modular results stay in range for arbitrary positive moduli.
    #[test]
    fn modular_result_in_range(n in 0u64..u64::MAX, m in 1u64..u64::MAX) {
        let cancel = CancellationToken::new();
        let result = fibonacci_mod(n, &BigInt::from(m), &cancel, &NoOpObserver::new()).unwrap();
        prop_assert!(result < BigUint::from(m));
    }
}
