//! Criterion benchmarks for native and transform multiplication.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use fibcalc_bigfft::nat;
use fibcalc_bigfft::{CacheConfig, FftEngine};
use fibcalc_memory::{Nat, Word};

fn operand(words: usize) -> Vec<Word> {
    (0..words as u64)
        .map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
        .collect()
}

fn bench_squaring(c: &mut Criterion) {
    let engine = FftEngine::default();
    engine.cache().set_config(CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    });

    let sizes: Vec<usize> = vec![256, 2_048, 16_384];

    let mut group = c.benchmark_group("Karatsuba");
    for &words in &sizes {
        let x = operand(words);
        group.bench_with_input(BenchmarkId::from_parameter(words), &x, |b, x| {
            let mut z = Nat::with_capacity(2 * words);
            b.iter(|| nat::sqr_to(&mut z, x, nat::KARATSUBA_THRESHOLD_WORDS));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("FFT");
    for &words in &sizes {
        let x = operand(words);
        group.bench_with_input(BenchmarkId::from_parameter(words), &x, |b, x| {
            let mut z = Nat::with_capacity(2 * words);
            b.iter(|| engine.sqr_to(&mut z, x).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_squaring);
criterion_main!(benches);
