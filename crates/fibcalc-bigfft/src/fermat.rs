//! Arithmetic modulo Fermat numbers 2^(64n) + 1.
//!
//! A ring value is stored in `n + 1` words. The canonical representative
//! lies in `[0, 2^(64n)]`, so the top word is 0 except for the single value
//! 2^(64n) ≡ -1, where it is 1. Every operation here leaves its output
//! canonical; no operation trusts its inputs beyond "top word is small".
//!
//! Multiplying by a power of two is a word shift followed by one fold,
//! because 2^(64n) ≡ -1. Products fold the same way.

use num_bigint::BigUint;
use num_traits::One;

use fibcalc_memory::{Nat, Word, WORD_BITS};

use crate::arith::{self, sub_with_borrow};
use crate::error::FftError;
use crate::nat::{self, KARATSUBA_THRESHOLD_WORDS};

/// Bit-length thresholds on `|x| + |y|` that select the transform order.
///
/// Index i is the first order whose threshold exceeds the operand size.
const FFT_SIZE_THRESHOLDS: [u64; 16] = [
    0,
    0,
    0,
    4 << 10,
    8 << 10,
    16 << 10,
    32 << 10,
    64 << 10,
    1 << 18,
    1 << 20,
    3 << 20,
    8 << 20,
    30 << 20,
    100 << 20,
    300 << 20,
    600 << 20,
];

/// Choose the transform order `k` and coefficient width `m` (words) for `x * y`.
///
/// The operands are cut into chunks of `m` words; `2^k` chunks hold the
/// whole product, so the cyclic convolution never wraps.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn fft_size(x_words: usize, y_words: usize) -> (u32, usize) {
    let words = x_words.saturating_add(y_words);
    let bits = (words as u64).saturating_mul(WORD_BITS as u64);
    let mut k = FFT_SIZE_THRESHOLDS.len() as u32;
    for (i, &threshold) in FFT_SIZE_THRESHOLDS.iter().enumerate() {
        if threshold > bits {
            k = i as u32;
            break;
        }
    }
    let m = (words >> k) + 1;
    (k, m)
}

/// Ring size `n` (words) for transform order `k` and coefficient width `m`.
///
/// Coefficients of the product are below `2^k * 2^(2*64m)`, so `64n` must
/// reach `2*64m + k`; it is also rounded to a multiple of `2^(k-1)` so the
/// `2^k`-th root of unity `2^(2*64n / 2^k)` is an integral power of two.
#[must_use]
pub fn value_size(k: u32, m: usize) -> usize {
    let needed = m.saturating_mul(2 * WORD_BITS).saturating_add(k as usize);
    let granule = (1usize << k.saturating_sub(1)).max(WORD_BITS);
    let bits = (needed / granule + 1).saturating_mul(granule);
    bits / WORD_BITS
}

/// Check that `(k, m, n)` describe a usable ring for the convolution.
pub fn validate_params(k: u32, m: usize, n: usize) -> Result<(), FftError> {
    let bits = n * WORD_BITS;
    let ok = k >= 1
        && k < 32
        && m > 0
        && bits >= 2 * m * WORD_BITS + k as usize
        && bits % (1usize << (k - 1)) == 0;
    if ok {
        Ok(())
    } else {
        Err(FftError::InvalidParameters { k, m, n })
    }
}

/// Whether `x` is a canonical representative.
#[must_use]
pub fn is_reduced(x: &[Word]) -> bool {
    let n = x.len() - 1;
    match x[n] {
        0 => true,
        1 => x[..n].iter().all(|&w| w == 0),
        _ => false,
    }
}

/// Reduce `z` in place to its canonical representative.
pub fn norm(z: &mut [Word]) {
    let n = z.len() - 1;
    let c = z[n];
    if c == 0 {
        return;
    }
    // low + c * 2^(64n) ≡ low - c
    z[n] = 0;
    if arith::sub_scalar(&mut z[..n], c) != 0 {
        // Negative: adding the modulus leaves low + 1 with low in wrapped form.
        if arith::add_scalar(&mut z[..n], 1) != 0 {
            z[n] = 1;
        }
    }
}

/// Add the modulus to a wrapped negative value, modulo 2^(64(n+1)).
fn add_modulus(z: &mut [Word]) {
    let n = z.len() - 1;
    arith::add_scalar(z, 1);
    z[n] = z[n].wrapping_add(1);
}

/// z = x + y.
pub fn add_into(z: &mut [Word], x: &[Word], y: &[Word]) {
    let carry = arith::add_vv(z, x, y);
    debug_assert_eq!(carry, 0);
    norm(z);
}

/// z += y.
pub fn add_assign(z: &mut [Word], y: &[Word]) {
    let carry = arith::add_assign(z, y);
    debug_assert_eq!(carry, 0);
    norm(z);
}

/// z = x - y.
pub fn sub_into(z: &mut [Word], x: &[Word], y: &[Word]) {
    if arith::sub_vv(z, x, y) != 0 {
        add_modulus(z);
    }
    norm(z);
}

/// z -= y.
pub fn sub_assign(z: &mut [Word], y: &[Word]) {
    if arith::sub_assign(z, y) != 0 {
        add_modulus(z);
    }
    norm(z);
}

/// z = -z.
pub fn neg_assign(z: &mut [Word]) {
    if z.iter().all(|&w| w == 0) {
        return;
    }
    let n = z.len() - 1;
    let mut borrow = 0;
    for (i, w) in z.iter_mut().enumerate() {
        let m = Word::from(i == 0) + Word::from(i == n);
        let (d, b) = sub_with_borrow(m, *w, borrow);
        *w = d;
        borrow = b;
    }
}

/// Words of scratch the shift and product routines need for ring size `n`.
#[must_use]
pub const fn wide_len(n: usize) -> usize {
    2 * n + 2
}

/// Reduce a double-width value held in `wide` into `z`.
fn fold(z: &mut [Word], wide: &mut [Word]) {
    let n = z.len() - 1;
    let (low, high) = wide.split_at_mut(n);
    let high = &mut high[..=n];
    norm(high);
    z[..n].copy_from_slice(low);
    z[n] = 0;
    sub_assign(z, high);
}

/// z = x * 2^s, for any shift; shifts are taken modulo 2*64n.
///
/// `wide` must hold at least [`wide_len`] words.
#[allow(clippy::cast_possible_truncation)]
pub fn shift_into(z: &mut [Word], x: &[Word], s: usize, wide: &mut [Word]) {
    let n = z.len() - 1;
    let ring_bits = n * WORD_BITS;
    let s = s % (2 * ring_bits);
    let (s, negate) = if s >= ring_bits {
        (s - ring_bits, true)
    } else {
        (s, false)
    };
    let wide = &mut wide[..wide_len(n)];
    wide.fill(0);
    let w = s / WORD_BITS;
    let b = (s % WORD_BITS) as u32;
    arith::shl_into(&mut wide[w..w + n + 2], x, b);
    fold(z, wide);
    if negate {
        neg_assign(z);
    }
}

/// z = x * y.
pub fn mul_into(z: &mut [Word], x: &[Word], y: &[Word], wide: &mut [Word]) {
    let n = z.len() - 1;
    let wide = &mut wide[..wide_len(n)];
    nat::mul_into(wide, x, y, KARATSUBA_THRESHOLD_WORDS);
    fold(z, wide);
}

/// z = x * x.
pub fn sqr_into(z: &mut [Word], x: &[Word], wide: &mut [Word]) {
    let n = z.len() - 1;
    let wide = &mut wide[..wide_len(n)];
    nat::sqr_into(wide, x, KARATSUBA_THRESHOLD_WORDS);
    fold(z, wide);
}

/// An owned ring value, for tests and one-off uses outside hot loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FermatNum {
    words: Vec<Word>,
}

impl FermatNum {
    /// Zero in the ring of size `n` words.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            words: vec![0; n + 1],
        }
    }

    /// Reduce `value` into the ring of size `n`.
    #[must_use]
    pub fn from_biguint(value: &BigUint, n: usize) -> Self {
        let reduced = value % Self::modulus_for(n);
        let mut words = Nat::from_biguint(&reduced).into_vec();
        words.resize(n + 1, 0);
        Self { words }
    }

    /// The value as a `BigUint`.
    #[must_use]
    pub fn to_biguint(&self) -> BigUint {
        Nat::from_words(&self.words).to_biguint()
    }

    /// Ring size in words.
    #[must_use]
    pub fn n(&self) -> usize {
        self.words.len() - 1
    }

    /// Raw words, `n + 1` of them.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// The modulus 2^(64n) + 1.
    #[must_use]
    pub fn modulus(&self) -> BigUint {
        Self::modulus_for(self.n())
    }

    fn modulus_for(n: usize) -> BigUint {
        (BigUint::one() << (n * WORD_BITS)) + BigUint::one()
    }

    /// self + other.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let mut z = Self::new(self.n());
        add_into(&mut z.words, &self.words, &other.words);
        z
    }

    /// self - other.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        let mut z = Self::new(self.n());
        sub_into(&mut z.words, &self.words, &other.words);
        z
    }

    /// -self.
    #[must_use]
    pub fn neg(&self) -> Self {
        let mut z = self.clone();
        neg_assign(&mut z.words);
        z
    }

    /// self * other.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let mut z = Self::new(self.n());
        let mut wide = vec![0; wide_len(self.n())];
        mul_into(&mut z.words, &self.words, &other.words, &mut wide);
        z
    }

    /// self * self.
    #[must_use]
    pub fn sqr(&self) -> Self {
        let mut z = Self::new(self.n());
        let mut wide = vec![0; wide_len(self.n())];
        sqr_into(&mut z.words, &self.words, &mut wide);
        z
    }

    /// self * 2^s.
    #[must_use]
    pub fn shift_left(&self, s: usize) -> Self {
        let mut z = Self::new(self.n());
        let mut wide = vec![0; wide_len(self.n())];
        shift_into(&mut z.words, &self.words, s, &mut wide);
        z
    }

    /// self / 2^s.
    #[must_use]
    pub fn shift_right(&self, s: usize) -> Self {
        let period = 2 * self.n() * WORD_BITS;
        self.shift_left(period - s % period)
    }

    /// Whether the value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Whether the stored words are canonical.
    #[must_use]
    pub fn is_reduced(&self) -> bool {
        is_reduced(&self.words)
    }
}
