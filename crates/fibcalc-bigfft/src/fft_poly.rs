//! Polynomial operations for FFT multiplication.
//!
//! An operand is cut into `m`-word chunks, the coefficients of a polynomial
//! evaluated at `x = 2^(64m)`. Its transform is a vector of `2^k` ring
//! values; pointwise products of transforms are transforms of the product
//! polynomial, which the inverse transform and a carry pass turn back into
//! an integer.

use rayon::prelude::*;

use fibcalc_memory::words::normalized_len;
use fibcalc_memory::Word;

use crate::arith;
use crate::error::FftError;
use crate::fermat::{self, wide_len};
use crate::fft_core::{scale_inverse, Scratch};
use crate::fft_recursion::{Fourier, PARALLEL_MIN_POINTS};

/// Coefficient form of an operand or product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly {
    k: u32,
    m: usize,
    width: usize,
    coeffs: Vec<Word>,
}

impl Poly {
    /// Split `x` into `2^k` coefficients of `m` words each.
    pub fn from_words(x: &[Word], k: u32, m: usize) -> Result<Self, FftError> {
        let x = &x[..normalized_len(x)];
        let capacity = (1usize << k) * m;
        if x.len() > capacity {
            return Err(FftError::OperandTooLarge {
                words: x.len(),
                capacity,
            });
        }
        let mut coeffs = vec![0; capacity];
        coeffs[..x.len()].copy_from_slice(x);
        Ok(Self {
            k,
            m,
            width: m,
            coeffs,
        })
    }

    /// Transform order.
    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Coefficient stride in words.
    #[must_use]
    pub fn m(&self) -> usize {
        self.m
    }

    /// Coefficient `i`.
    #[must_use]
    pub fn coeff(&self, i: usize) -> &[Word] {
        &self.coeffs[i * self.width..(i + 1) * self.width]
    }

    /// Forward transform over the ring of size `fourier.n`.
    #[must_use]
    pub fn transform(&self, fourier: &Fourier<'_>) -> PolyValues {
        let n = fourier.n;
        let len = 1usize << self.k;
        debug_assert!(self.width <= n);
        let mut src = fourier.alloc.alloc(len * (n + 1));
        for (i, e) in src.chunks_exact_mut(n + 1).enumerate() {
            e[..self.width].copy_from_slice(self.coeff(i));
        }
        let mut values = fourier.alloc.alloc_raw(len * (n + 1));
        fourier.transform(&mut values, &src, false);
        fourier.alloc.free(src);
        PolyValues {
            k: self.k,
            n,
            values,
        }
    }

    /// Evaluate at `2^(64m)`, writing the integer into `dst`.
    ///
    /// Fails if a non-zero carry or coefficient lands outside `dst`.
    pub fn to_words(&self, dst: &mut [Word]) -> Result<(), FftError> {
        dst.fill(0);
        for i in 0..(1usize << self.k) {
            let c = self.coeff(i);
            let c = &c[..normalized_len(c)];
            if c.is_empty() {
                continue;
            }
            let at = i * self.m;
            if at + c.len() > dst.len() {
                return Err(FftError::CarryOverflow(dst.len()));
            }
            if arith::add_assign(&mut dst[at..], c) != 0 {
                return Err(FftError::CarryOverflow(dst.len()));
            }
        }
        Ok(())
    }

    /// Release the coefficient buffer.
    #[must_use]
    pub fn into_words(self) -> Vec<Word> {
        self.coeffs
    }
}

/// Transform of a polynomial: `2^k` values in the ring of size `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyValues {
    k: u32,
    n: usize,
    values: Vec<Word>,
}

impl PolyValues {
    /// Wrap a transform buffer, e.g. one restored from the cache.
    #[must_use]
    pub fn from_words(k: u32, n: usize, values: Vec<Word>) -> Self {
        debug_assert_eq!(values.len(), (1usize << k) * (n + 1));
        Self { k, n, values }
    }

    /// Transform order.
    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Ring size in words.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Flat value buffer.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.values
    }

    /// Release the value buffer.
    #[must_use]
    pub fn into_words(self) -> Vec<Word> {
        self.values
    }

    /// Pointwise product.
    pub fn mul(&self, other: &Self, fourier: &Fourier<'_>) -> Result<Self, FftError> {
        if self.k != other.k || self.n != other.n {
            return Err(FftError::ShapeMismatch(self.k, self.n, other.k, other.n));
        }
        Ok(self.pointwise(fourier, |z, a, i, wide| {
            fermat::mul_into(z, a, &other.values[i * (self.n + 1)..(i + 1) * (self.n + 1)], wide);
        }))
    }

    /// Pointwise square; one forward transform serves both factors.
    #[must_use]
    pub fn sqr(&self, fourier: &Fourier<'_>) -> Self {
        self.pointwise(fourier, |z, a, _, wide| fermat::sqr_into(z, a, wide))
    }

    fn pointwise<F>(&self, fourier: &Fourier<'_>, op: F) -> Self
    where
        F: Fn(&mut [Word], &[Word], usize, &mut [Word]) + Sync,
    {
        let n1 = self.n + 1;
        let mut out = fourier.alloc.alloc_raw(self.values.len());
        let len = 1usize << self.k;
        if len >= PARALLEL_MIN_POINTS && fourier.parallel_depth > 0 {
            out.par_chunks_exact_mut(n1)
                .zip(self.values.par_chunks_exact(n1))
                .enumerate()
                .for_each_init(
                    || vec![0; wide_len(self.n)],
                    |wide, (i, (z, a))| op(z, a, i, wide),
                );
        } else {
            let mut wide = vec![0; wide_len(self.n)];
            for (i, (z, a)) in out
                .chunks_exact_mut(n1)
                .zip(self.values.chunks_exact(n1))
                .enumerate()
            {
                op(z, a, i, &mut wide);
            }
        }
        Self {
            k: self.k,
            n: self.n,
            values: out,
        }
    }

    /// Inverse transform, scaled by `2^-k`, as a polynomial with stride `m`.
    #[must_use]
    pub fn inv_transform(&self, m: usize, fourier: &Fourier<'_>) -> Poly {
        let mut coeffs = fourier.alloc.alloc_raw(self.values.len());
        fourier.transform(&mut coeffs, &self.values, true);
        let mut scratch = Scratch::new(self.n, fourier.alloc);
        scale_inverse(&mut coeffs, self.n, self.k, &mut scratch);
        scratch.release(fourier.alloc);
        Poly {
            k: self.k,
            m,
            width: self.n + 1,
            coeffs,
        }
    }
}
