//! Property-based tests for the transform multiplier.
//!
//! Products from the FFT pipeline are checked against native
//! multiplication, with and without the transform cache.

use std::sync::Arc;

use num_bigint::BigUint;
use proptest::prelude::*;

use fibcalc_bigfft::fermat::FermatNum;
use fibcalc_bigfft::nat;
use fibcalc_bigfft::{CacheConfig, FftConfig, FftEngine, SimpleAllocator, TaskSemaphore, TransformCache};
use fibcalc_memory::{Nat, Word};

fn engine(enabled: bool, parallel_depth: usize) -> FftEngine {
    FftEngine::with_parts(
        FftConfig { parallel_depth },
        Arc::new(TransformCache::new(CacheConfig {
            enabled,
            max_entries: 16,
            min_bit_len: 0,
        })),
        Arc::new(SimpleAllocator),
        Arc::new(TaskSemaphore::new(4)),
    )
}

fn operand() -> impl Strategy<Value = Vec<Word>> {
    prop::collection::vec(any::<u64>(), 1..400)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// FFT products equal native products for random operands.
    #[test]
    fn fft_matches_native(x in operand(), y in operand()) {
        let mut fft = Nat::new();
        engine(false, 2).mul_to(&mut fft, &x, &y).unwrap();
        let mut native = Nat::new();
        nat::mul_to(&mut native, &x, &y, nat::KARATSUBA_THRESHOLD_WORDS);
        prop_assert_eq!(fft, native);
    }

    /// FFT squares equal native squares.
    #[test]
    fn fft_square_matches_native(x in operand()) {
        let mut fft = Nat::new();
        engine(false, 0).sqr_to(&mut fft, &x).unwrap();
        let mut native = Nat::new();
        nat::sqr_to(&mut native, &x, nat::KARATSUBA_THRESHOLD_WORDS);
        prop_assert_eq!(fft, native);
    }

    /// Enabling the transform cache never changes a result, even when the
    /// same operand is reused.
    #[test]
    fn cache_is_transparent(x in operand(), y in operand()) {
        let cached = engine(true, 2);
        let plain = engine(false, 2);
        for _ in 0..2 {
            let mut a = Nat::new();
            cached.mul_to(&mut a, &x, &y).unwrap();
            let mut b = Nat::new();
            plain.mul_to(&mut b, &x, &y).unwrap();
            prop_assert_eq!(&a, &b);
            cached.sqr_to(&mut a, &x).unwrap();
            plain.sqr_to(&mut b, &x).unwrap();
            prop_assert_eq!(&a, &b);
        }
        prop_assert!(cached.stats().cache.hits > 0);
    }

    /// Ring products stay reduced and match the product modulo 2^(64n)+1.
    #[test]
    fn fermat_products_are_reduced(a in prop::collection::vec(any::<u64>(), 4), b in prop::collection::vec(any::<u64>(), 4)) {
        let n = 4;
        let fa = FermatNum::from_biguint(&Nat::from_words(&a).to_biguint(), n);
        let fb = FermatNum::from_biguint(&Nat::from_words(&b).to_biguint(), n);
        let product = fa.mul(&fb);
        prop_assert!(product.is_reduced());
        let expected: BigUint = (fa.to_biguint() * fb.to_biguint()) % fa.modulus();
        prop_assert_eq!(product.to_biguint(), expected);
    }
}
