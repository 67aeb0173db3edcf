//! Word-level storage for arbitrary-precision naturals.
//!
//! A natural number is a little-endian sequence of 64-bit words whose logical
//! length never exceeds the backing capacity. Normalized values carry no
//! leading zero words; zero is the empty sequence.

use num_bigint::BigUint;

/// A single limb.
pub type Word = u64;

/// Bits per limb.
pub const WORD_BITS: usize = 64;

/// Bits of F(n) per unit of n: log2 of the golden ratio.
pub const LOG2_PHI: f64 = 0.694_241_913_630_617_4;

/// Length of `words` once leading zero words are stripped.
#[inline]
#[must_use]
pub fn normalized_len(words: &[Word]) -> usize {
    let mut len = words.len();
    while len > 0 && words[len - 1] == 0 {
        len -= 1;
    }
    len
}

/// Number of significant bits in a word slice.
#[must_use]
pub fn bit_len(words: &[Word]) -> usize {
    let len = normalized_len(words);
    if len == 0 {
        return 0;
    }
    (len - 1) * WORD_BITS + (WORD_BITS - words[len - 1].leading_zeros() as usize)
}

/// Storage contract for a big natural's backing buffer.
///
/// Implementations must reuse their existing capacity whenever a requested
/// length fits; only growth beyond `capacity()` may reallocate.
pub trait WordBuf: Send {
    /// The logical words.
    fn words(&self) -> &[Word];

    /// The logical words, mutably.
    fn words_mut(&mut self) -> &mut [Word];

    /// Number of words available without reallocating.
    fn capacity(&self) -> usize;

    /// Set the logical length. Words in `[old_len, len)` are zero; words
    /// below the old length keep their contents.
    fn resize_words(&mut self, len: usize);

    /// Logical length in words.
    fn len(&self) -> usize {
        self.words().len()
    }

    /// Whether the logical length is zero.
    fn is_empty(&self) -> bool {
        self.words().is_empty()
    }

    /// Set the logical length with every word zeroed.
    fn reset_words(&mut self, len: usize) {
        self.resize_words(0);
        self.resize_words(len);
    }

    /// Strip leading zero words.
    fn normalize(&mut self) {
        let len = normalized_len(self.words());
        self.resize_words(len);
    }

    /// Overwrite with a copy of `src`, normalized.
    fn set_words(&mut self, src: &[Word]) {
        let len = normalized_len(src);
        self.resize_words(len);
        self.words_mut().copy_from_slice(&src[..len]);
    }

    /// Overwrite with a single word value.
    fn set_u64(&mut self, value: u64) {
        if value == 0 {
            self.resize_words(0);
        } else {
            self.resize_words(1);
            self.words_mut()[0] = value;
        }
    }

    /// Significant bits of the current value.
    fn bits(&self) -> usize {
        bit_len(self.words())
    }
}

impl WordBuf for Vec<Word> {
    fn words(&self) -> &[Word] {
        self
    }

    fn words_mut(&mut self) -> &mut [Word] {
        self
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }

    fn resize_words(&mut self, len: usize) {
        self.resize(len, 0);
    }
}

/// An owned, normalized natural number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nat {
    words: Vec<Word>,
}

impl Nat {
    /// Zero.
    #[must_use]
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Zero with room for `words` limbs.
    #[must_use]
    pub fn with_capacity(words: usize) -> Self {
        Self {
            words: Vec::with_capacity(words),
        }
    }

    /// Build from little-endian words.
    #[must_use]
    pub fn from_words(words: &[Word]) -> Self {
        let mut nat = Self::with_capacity(words.len());
        nat.set_words(words);
        nat
    }

    /// Take ownership of a word vector.
    #[must_use]
    pub fn from_vec(mut words: Vec<Word>) -> Self {
        let len = normalized_len(&words);
        words.truncate(len);
        Self { words }
    }

    /// Build from a `BigUint`.
    #[must_use]
    pub fn from_biguint(value: &BigUint) -> Self {
        Self {
            words: value.iter_u64_digits().collect(),
        }
    }

    /// Convert to a `BigUint`.
    #[must_use]
    pub fn to_biguint(&self) -> BigUint {
        words_to_biguint(&self.words)
    }

    /// Release the backing vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Word> {
        self.words
    }
}

impl From<u64> for Nat {
    fn from(value: u64) -> Self {
        let mut nat = Self::new();
        nat.set_u64(value);
        nat
    }
}

impl WordBuf for Nat {
    fn words(&self) -> &[Word] {
        &self.words
    }

    fn words_mut(&mut self) -> &mut [Word] {
        &mut self.words
    }

    fn capacity(&self) -> usize {
        self.words.capacity()
    }

    fn resize_words(&mut self, len: usize) {
        self.words.resize(len, 0);
    }
}

/// Convert little-endian words to a `BigUint`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn words_to_biguint(words: &[Word]) -> BigUint {
    let len = normalized_len(words);
    let mut digits = Vec::with_capacity(len * 2);
    for &w in &words[..len] {
        digits.push(w as u32);
        digits.push((w >> 32) as u32);
    }
    BigUint::new(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    #[test]
    fn log2_phi_is_log2_of_golden_ratio() {
        let phi = (1.0 + 5f64.sqrt()) / 2.0;
        assert!((LOG2_PHI - phi.log2()).abs() < 1e-15);
    }

    #[test]
    fn normalized_len_strips_zeros() {
        assert_eq!(normalized_len(&[]), 0);
        assert_eq!(normalized_len(&[0, 0]), 0);
        assert_eq!(normalized_len(&[1, 0, 0]), 1);
        assert_eq!(normalized_len(&[0, 5]), 2);
    }

    #[test]
    fn bit_len_values() {
        assert_eq!(bit_len(&[]), 0);
        assert_eq!(bit_len(&[1]), 1);
        assert_eq!(bit_len(&[255]), 8);
        assert_eq!(bit_len(&[0, 1]), 65);
        assert_eq!(bit_len(&[u64::MAX, 0]), 64);
    }

    #[test]
    fn nat_biguint_roundtrip() {
        let value = (BigUint::one() << 200) + BigUint::from(12_345u32);
        let nat = Nat::from_biguint(&value);
        assert_eq!(nat.len(), 4);
        assert_eq!(nat.to_biguint(), value);
    }

    #[test]
    fn nat_zero_is_empty() {
        let nat = Nat::from(0u64);
        assert!(nat.is_empty());
        assert_eq!(nat.to_biguint(), BigUint::ZERO);
    }

    #[test]
    fn resize_keeps_capacity() {
        let mut nat = Nat::with_capacity(16);
        let ptr = nat.words.as_ptr();
        nat.resize_words(16);
        nat.resize_words(3);
        nat.resize_words(10);
        assert_eq!(nat.words.as_ptr(), ptr);
        assert!(nat.words()[3..].iter().all(|&w| w == 0));
    }

    #[test]
    fn set_words_normalizes() {
        let mut nat = Nat::new();
        nat.set_words(&[7, 0, 0]);
        assert_eq!(nat.words(), &[7]);
    }

    #[test]
    fn reset_words_zeroes_everything() {
        let mut v: Vec<Word> = vec![1, 2, 3];
        v.reset_words(4);
        assert_eq!(v, vec![0, 0, 0, 0]);
    }

    proptest::proptest! {
        #[test]
        fn bit_len_matches_biguint(words in proptest::collection::vec(proptest::num::u64::ANY, 0..12)) {
            let value = words_to_biguint(&words);
            proptest::prop_assert_eq!(bit_len(&words) as u64, value.bits());
            proptest::prop_assert_eq!(Nat::from_biguint(&value).len(), normalized_len(&words));
        }
    }
}
