//! Native multiplication on word slices.
//!
//! Schoolbook below the Karatsuba threshold, Karatsuba above it. Squaring
//! has its own path in both regimes: the schoolbook square computes each
//! cross product once and doubles, and the Karatsuba square recurses into
//! three half-size squarings.

use fibcalc_memory::words::normalized_len;
use fibcalc_memory::{Word, WordBuf};

use crate::arith::{add_assign, add_with_carry, mul_add_vw, mul_wide, shl_assign, sub_assign};

/// Default operand size, in words, where Karatsuba takes over (3072 bits).
pub const KARATSUBA_THRESHOLD_WORDS: usize = 48;

/// Smallest Karatsuba threshold accepted; below it the split overhead wins.
const MIN_KARATSUBA_WORDS: usize = 4;

/// Write `x * y` into `z` (`z.len() >= x.len() + y.len()`).
pub fn mul_into(z: &mut [Word], x: &[Word], y: &[Word], karatsuba_words: usize) {
    z.fill(0);
    let x = &x[..normalized_len(x)];
    let y = &y[..normalized_len(y)];
    mul_acc(z, x, y, karatsuba_words.max(MIN_KARATSUBA_WORDS));
}

/// Write `x * x` into `z` (`z.len() >= 2 * x.len()`).
pub fn sqr_into(z: &mut [Word], x: &[Word], karatsuba_words: usize) {
    z.fill(0);
    let x = &x[..normalized_len(x)];
    sqr_acc(z, x, karatsuba_words.max(MIN_KARATSUBA_WORDS));
}

/// `z = x * y`, reusing z's capacity.
pub fn mul_to<B: WordBuf + ?Sized>(z: &mut B, x: &[Word], y: &[Word], karatsuba_words: usize) {
    z.resize_words(normalized_len(x) + normalized_len(y));
    mul_into(z.words_mut(), x, y, karatsuba_words);
    z.normalize();
}

/// `z = x * x`, reusing z's capacity.
pub fn sqr_to<B: WordBuf + ?Sized>(z: &mut B, x: &[Word], karatsuba_words: usize) {
    z.resize_words(2 * normalized_len(x));
    sqr_into(z.words_mut(), x, karatsuba_words);
    z.normalize();
}

/// z += x * y, where z is already zero over the product range.
fn mul_acc(z: &mut [Word], x: &[Word], y: &[Word], threshold: usize) {
    let (x, y) = if x.len() >= y.len() { (x, y) } else { (y, x) };
    if y.is_empty() {
        return;
    }
    if y.len() < threshold {
        schoolbook(z, x, y);
        return;
    }
    if 2 * y.len() <= x.len() {
        unbalanced(z, x, y, threshold);
        return;
    }
    karatsuba(z, x, y, threshold);
}

fn schoolbook(z: &mut [Word], x: &[Word], y: &[Word]) {
    for (i, &xi) in x.iter().enumerate() {
        if xi == 0 {
            continue;
        }
        let carry = mul_add_vw(&mut z[i..i + y.len()], y, xi);
        add_assign(&mut z[i + y.len()..], &[carry]);
    }
}

/// x is at least twice as long as y: multiply y by x in y-sized chunks.
fn unbalanced(z: &mut [Word], x: &[Word], y: &[Word], threshold: usize) {
    let mut partial = vec![0; 2 * y.len()];
    for (c, chunk) in x.chunks(y.len()).enumerate() {
        let chunk = &chunk[..normalized_len(chunk)];
        if chunk.is_empty() {
            continue;
        }
        let len = chunk.len() + y.len();
        partial[..len].fill(0);
        mul_acc(&mut partial[..len], chunk, y, threshold);
        let at = c * y.len();
        add_assign(&mut z[at..], &partial[..normalized_len(&partial[..len])]);
    }
}

fn karatsuba(z: &mut [Word], x: &[Word], y: &[Word], threshold: usize) {
    let h = x.len() / 2;
    let (x0, x1) = x.split_at(h);
    let (y0, y1) = y.split_at(h);
    let x0 = &x0[..normalized_len(x0)];
    let y0 = &y0[..normalized_len(y0)];

    let mut z0 = vec![0; x0.len() + y0.len()];
    mul_acc(&mut z0, x0, y0, threshold);
    let mut z2 = vec![0; x1.len() + y1.len()];
    mul_acc(&mut z2, x1, y1, threshold);

    let sx = sum(x0, x1);
    let sy = sum(y0, y1);
    let mut z1 = vec![0; sx.len() + sy.len()];
    mul_acc(&mut z1, &sx, &sy, threshold);
    sub_assign(&mut z1, &z0);
    sub_assign(&mut z1, &z2);

    add_assign(&mut z[..], &z0);
    add_assign(&mut z[h..], &z1[..normalized_len(&z1)]);
    add_assign(&mut z[2 * h..], &z2[..normalized_len(&z2)]);
}

/// z += x * x, where z is already zero over the product range.
fn sqr_acc(z: &mut [Word], x: &[Word], threshold: usize) {
    if x.is_empty() {
        return;
    }
    if x.len() < threshold {
        schoolbook_sqr(z, x);
        return;
    }
    let h = x.len() / 2;
    let (x0, x1) = x.split_at(h);
    let x0 = &x0[..normalized_len(x0)];

    let mut z0 = vec![0; 2 * x0.len()];
    sqr_acc(&mut z0, x0, threshold);
    let mut z2 = vec![0; 2 * x1.len()];
    sqr_acc(&mut z2, x1, threshold);

    let s = sum(x0, x1);
    let mut z1 = vec![0; 2 * s.len()];
    sqr_acc(&mut z1, &s, threshold);
    sub_assign(&mut z1, &z0);
    sub_assign(&mut z1, &z2);

    add_assign(&mut z[..], &z0);
    add_assign(&mut z[h..], &z1[..normalized_len(&z1)]);
    add_assign(&mut z[2 * h..], &z2[..normalized_len(&z2)]);
}

fn schoolbook_sqr(z: &mut [Word], x: &[Word]) {
    let n = x.len();
    // Cross products x[i]*x[j] for i < j, each computed once.
    for i in 0..n.saturating_sub(1) {
        let rest = &x[i + 1..];
        let carry = mul_add_vw(&mut z[2 * i + 1..i + n], rest, x[i]);
        z[i + n] = carry;
    }
    shl_assign(&mut z[..2 * n], 1);
    // Diagonal terms.
    let mut carry = 0;
    for (i, &xi) in x.iter().enumerate() {
        let (lo, hi) = mul_wide(xi, xi);
        let (s0, c0) = add_with_carry(z[2 * i], lo, carry);
        let (s1, c1) = add_with_carry(z[2 * i + 1], hi, c0);
        z[2 * i] = s0;
        z[2 * i + 1] = s1;
        carry = c1;
    }
}

/// x + y as a fresh vector one word longer than the longer input.
fn sum(x: &[Word], y: &[Word]) -> Vec<Word> {
    let (long, short) = if x.len() >= y.len() { (x, y) } else { (y, x) };
    let mut out = Vec::with_capacity(long.len() + 1);
    out.extend_from_slice(long);
    out.push(0);
    add_assign(&mut out, short);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibcalc_memory::Nat;
    use num_bigint::BigUint;
    use num_traits::One;

    fn pattern(words: usize, seed: u64) -> Vec<Word> {
        let mut state = seed;
        (0..words)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                state
            })
            .collect()
    }

    fn big(words: &[Word]) -> BigUint {
        Nat::from_words(words).to_biguint()
    }

    fn product(x: &[Word], y: &[Word], threshold: usize) -> BigUint {
        let mut z = vec![0; x.len() + y.len()];
        mul_into(&mut z, x, y, threshold);
        big(&z)
    }

    #[test]
    fn schoolbook_small() {
        let x = [12345];
        let y = [67890];
        assert_eq!(product(&x, &y, 48), BigUint::from(838_102_050u64));
    }

    #[test]
    fn karatsuba_matches_reference() {
        for (xw, yw) in [(8, 8), (9, 7), (33, 20), (64, 64), (100, 51)] {
            let x = pattern(xw, 1);
            let y = pattern(yw, 2);
            assert_eq!(
                product(&x, &y, 4),
                big(&x) * big(&y),
                "{xw}x{yw} words"
            );
        }
    }

    #[test]
    fn unbalanced_matches_reference() {
        let x = pattern(200, 3);
        let y = pattern(9, 4);
        assert_eq!(product(&x, &y, 4), big(&x) * big(&y));
    }

    #[test]
    fn all_ones_operands() {
        let x = vec![u64::MAX; 40];
        let y = vec![u64::MAX; 37];
        assert_eq!(product(&x, &y, 4), big(&x) * big(&y));
    }

    #[test]
    fn squaring_matches_reference() {
        for words in [1, 2, 5, 16, 47, 48, 97] {
            let x = pattern(words, 5);
            let mut z = vec![0; 2 * words];
            sqr_into(&mut z, &x, 8);
            let bx = big(&x);
            assert_eq!(big(&z), &bx * &bx, "{words} words");
        }
    }

    #[test]
    fn squaring_all_ones() {
        let x = vec![u64::MAX; 33];
        let mut z = vec![0; 66];
        sqr_into(&mut z, &x, 4);
        let bx = (BigUint::one() << (33 * 64)) - BigUint::one();
        assert_eq!(big(&z), &bx * &bx);
    }

    #[test]
    fn zero_operand() {
        let mut z = Nat::from(77u64);
        mul_to(&mut z, &[], &[5], KARATSUBA_THRESHOLD_WORDS);
        assert!(z.is_empty());
    }

    #[test]
    fn mul_to_reuses_capacity() {
        let x = pattern(10, 6);
        let y = pattern(10, 7);
        let mut z = Nat::with_capacity(64);
        let cap = z.capacity();
        mul_to(&mut z, &x, &y, KARATSUBA_THRESHOLD_WORDS);
        assert_eq!(z.capacity(), cap);
        assert_eq!(z.to_biguint(), big(&x) * big(&y));
    }

    #[test]
    fn operands_with_leading_zeros() {
        let x = [7, 0, 0];
        let y = [3, 0];
        let mut z = Nat::new();
        mul_to(&mut z, &x, &y, KARATSUBA_THRESHOLD_WORDS);
        assert_eq!(z.words(), &[21]);
    }
}
