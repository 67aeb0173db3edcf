//! Transform building blocks: scratch space, twiddle shifts, butterflies and
//! the direct transforms that end the recursion.
//!
//! Transform buffers are flat: element `i` of a vector over the ring of size
//! `n` occupies words `i*(n+1) .. (i+1)*(n+1)`. A sub-transform reads its
//! source through an `(offset, stride)` pair instead of copying it out.

use fibcalc_memory::{Word, WORD_BITS};

use crate::allocator::TempAllocator;
use crate::fermat::{add_assign, add_into, shift_into, sub_into, wide_len};

/// Largest order evaluated without recursing (4 points).
pub const DIRECT_MAX_ORDER: u32 = 2;

/// Per-thread temporaries for ring size `n`.
pub struct Scratch {
    tmp: Vec<Word>,
    wide: Vec<Word>,
}

impl Scratch {
    /// Take scratch buffers for ring size `n` from `alloc`.
    pub fn new(n: usize, alloc: &dyn TempAllocator) -> Self {
        Self {
            tmp: alloc.alloc(n + 1),
            wide: alloc.alloc_raw(wide_len(n)),
        }
    }

    /// Hand the buffers back.
    pub fn release(self, alloc: &dyn TempAllocator) {
        alloc.free(self.tmp);
        alloc.free(self.wide);
    }
}

/// Element `i` of a flat ring vector.
#[inline]
#[must_use]
pub fn elem(buf: &[Word], i: usize, n: usize) -> &[Word] {
    &buf[i * (n + 1)..(i + 1) * (n + 1)]
}

/// Shift amount for `ω^i`, where ω is the principal `2^size`-th root of unity.
///
/// In the ring 2^(64n)+1, 2 has order `2*64n`, so ω = 2^((2*64n) >> size)
/// and the inverse root is the complementary shift.
#[inline]
#[must_use]
pub fn root_shift(n: usize, size: u32, i: usize, backward: bool) -> usize {
    let period = 2 * n * WORD_BITS;
    let s = ((period >> size) * i) % period;
    if backward && s != 0 {
        period - s
    } else {
        s
    }
}

/// Combine the transforms of the even and odd halves in place.
///
/// `lo[i]` becomes `lo[i] + ω^i hi[i]`, `hi[i]` becomes `lo[i] - ω^i hi[i]`.
pub fn butterflies(
    lo: &mut [Word],
    hi: &mut [Word],
    n: usize,
    size: u32,
    backward: bool,
    scratch: &mut Scratch,
) {
    let n1 = n + 1;
    for (i, (a, b)) in lo
        .chunks_exact_mut(n1)
        .zip(hi.chunks_exact_mut(n1))
        .enumerate()
    {
        let s = root_shift(n, size, i, backward);
        shift_into(&mut scratch.tmp, b, s, &mut scratch.wide);
        sub_into(b, a, &scratch.tmp);
        add_assign(a, &scratch.tmp);
    }
}

/// Evaluate a transform of order `size <= DIRECT_MAX_ORDER` directly.
#[allow(clippy::too_many_arguments)]
pub fn direct(
    dst: &mut [Word],
    src: &[Word],
    offset: usize,
    stride: usize,
    size: u32,
    n: usize,
    backward: bool,
    scratch: &mut Scratch,
) {
    debug_assert!(size <= DIRECT_MAX_ORDER);
    let n1 = n + 1;
    match size {
        0 => dst.copy_from_slice(elem(src, offset, n)),
        1 => {
            let a0 = elem(src, offset, n);
            let a1 = elem(src, offset + stride, n);
            let (d0, d1) = dst.split_at_mut(n1);
            add_into(d0, a0, a1);
            sub_into(d1, a0, a1);
        }
        _ => {
            let (lo, hi) = dst.split_at_mut(2 * n1);
            direct(lo, src, offset, 2 * stride, 1, n, backward, scratch);
            direct(hi, src, offset + stride, 2 * stride, 1, n, backward, scratch);
            butterflies(lo, hi, n, 2, backward, scratch);
        }
    }
}

/// Multiply every element by `2^-k`, undoing the `2^k` gain of a round trip.
pub fn scale_inverse(buf: &mut [Word], n: usize, k: u32, scratch: &mut Scratch) {
    let period = 2 * n * WORD_BITS;
    let s = period - k as usize;
    for e in buf.chunks_exact_mut(n + 1) {
        shift_into(&mut scratch.tmp, e, s, &mut scratch.wide);
        e.copy_from_slice(&scratch.tmp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SimpleAllocator;
    use crate::fermat::FermatNum;
    use num_bigint::BigUint;

    fn flat(vals: &[u64], n: usize) -> Vec<Word> {
        vals.iter()
            .flat_map(|&v| {
                FermatNum::from_biguint(&BigUint::from(v), n)
                    .words()
                    .to_vec()
            })
            .collect()
    }

    /// Naive DFT: X_j = sum_i a_i ω^(ij).
    fn naive(vals: &[u64], n: usize, size: u32) -> Vec<Word> {
        let len = 1usize << size;
        let mut out = Vec::new();
        for j in 0..len {
            let mut acc = FermatNum::new(n);
            for (i, &v) in vals.iter().enumerate() {
                let term = FermatNum::from_biguint(&BigUint::from(v), n)
                    .shift_left(root_shift(n, size, (i * j) % len, false));
                acc = acc.add(&term);
            }
            out.extend_from_slice(acc.words());
        }
        out
    }

    #[test]
    fn root_shift_values() {
        // n = 1: period 128, 4-point root is 2^32.
        assert_eq!(root_shift(1, 2, 1, false), 32);
        assert_eq!(root_shift(1, 2, 1, true), 96);
        assert_eq!(root_shift(1, 2, 0, true), 0);
    }

    #[test]
    fn direct_matches_naive() {
        let alloc = SimpleAllocator;
        let n = 1;
        let vals = [1u64, 2, 3, 4];
        let src = flat(&vals, n);
        for size in 0..=2u32 {
            let len = 1usize << size;
            let mut dst = vec![0; len * (n + 1)];
            let mut scratch = Scratch::new(n, &alloc);
            direct(&mut dst, &src, 0, 4 >> size, size, n, false, &mut scratch);
            let picked: Vec<u64> = (0..len).map(|j| vals[j * (4 >> size)]).collect();
            assert_eq!(dst, naive(&picked, n, size), "size {size}");
        }
    }

    #[test]
    fn direct_roundtrip() {
        let alloc = SimpleAllocator;
        let n = 1;
        let src = flat(&[10, 20, 30, 40], n);
        let mut scratch = Scratch::new(n, &alloc);
        let mut fwd = vec![0; src.len()];
        direct(&mut fwd, &src, 0, 1, 2, n, false, &mut scratch);
        let mut back = vec![0; src.len()];
        direct(&mut back, &fwd, 0, 1, 2, n, true, &mut scratch);
        scale_inverse(&mut back, n, 2, &mut scratch);
        assert_eq!(back, src);
    }
}
