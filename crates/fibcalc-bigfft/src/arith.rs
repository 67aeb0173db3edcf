//! Portable limb arithmetic.
//!
//! Every vector routine works on little-endian word slices and returns the
//! carry or borrow out of the most significant word.

use fibcalc_memory::Word;

/// Add with carry: a + b + carry -> (sum, `new_carry`)
#[inline]
#[must_use]
pub fn add_with_carry(a: Word, b: Word, carry: Word) -> (Word, Word) {
    let (s1, c1) = a.overflowing_add(b);
    let (s2, c2) = s1.overflowing_add(carry);
    (s2, Word::from(c1) + Word::from(c2))
}

/// Subtract with borrow: a - b - borrow -> (diff, `new_borrow`)
#[inline]
#[must_use]
pub fn sub_with_borrow(a: Word, b: Word, borrow: Word) -> (Word, Word) {
    let (d1, b1) = a.overflowing_sub(b);
    let (d2, b2) = d1.overflowing_sub(borrow);
    (d2, Word::from(b1) + Word::from(b2))
}

/// Multiply: a * b -> (low, high)
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn mul_wide(a: Word, b: Word) -> (Word, Word) {
    let prod = u128::from(a) * u128::from(b);
    (prod as Word, (prod >> 64) as Word)
}

/// Add a scalar into a slice, returning the carry out.
pub fn add_scalar(data: &mut [Word], scalar: Word) -> Word {
    let mut carry = scalar;
    for limb in data.iter_mut() {
        if carry == 0 {
            break;
        }
        let (sum, c) = limb.overflowing_add(carry);
        *limb = sum;
        carry = Word::from(c);
    }
    carry
}

/// Subtract a scalar from a slice, returning the borrow out.
pub fn sub_scalar(data: &mut [Word], scalar: Word) -> Word {
    let mut borrow = scalar;
    for limb in data.iter_mut() {
        if borrow == 0 {
            break;
        }
        let (diff, b) = limb.overflowing_sub(borrow);
        *limb = diff;
        borrow = Word::from(b);
    }
    borrow
}

/// z = x + y over equal-length slices.
pub fn add_vv(z: &mut [Word], x: &[Word], y: &[Word]) -> Word {
    debug_assert!(z.len() == x.len() && x.len() == y.len());
    let mut carry = 0;
    for ((zi, &xi), &yi) in z.iter_mut().zip(x).zip(y) {
        let (s, c) = add_with_carry(xi, yi, carry);
        *zi = s;
        carry = c;
    }
    carry
}

/// z = x - y over equal-length slices.
pub fn sub_vv(z: &mut [Word], x: &[Word], y: &[Word]) -> Word {
    debug_assert!(z.len() == x.len() && x.len() == y.len());
    let mut borrow = 0;
    for ((zi, &xi), &yi) in z.iter_mut().zip(x).zip(y) {
        let (d, b) = sub_with_borrow(xi, yi, borrow);
        *zi = d;
        borrow = b;
    }
    borrow
}

/// z += x, with `x.len() <= z.len()`; the carry runs through the rest of z.
pub fn add_assign(z: &mut [Word], x: &[Word]) -> Word {
    debug_assert!(x.len() <= z.len());
    let (lo, hi) = z.split_at_mut(x.len());
    let mut carry = 0;
    for (zi, &xi) in lo.iter_mut().zip(x) {
        let (s, c) = add_with_carry(*zi, xi, carry);
        *zi = s;
        carry = c;
    }
    add_scalar(hi, carry)
}

/// z -= x, with `x.len() <= z.len()`; the borrow runs through the rest of z.
pub fn sub_assign(z: &mut [Word], x: &[Word]) -> Word {
    debug_assert!(x.len() <= z.len());
    let (lo, hi) = z.split_at_mut(x.len());
    let mut borrow = 0;
    for (zi, &xi) in lo.iter_mut().zip(x) {
        let (d, b) = sub_with_borrow(*zi, xi, borrow);
        *zi = d;
        borrow = b;
    }
    sub_scalar(hi, borrow)
}

/// z += x * y for a single word y, over equal-length slices.
pub fn mul_add_vw(z: &mut [Word], x: &[Word], y: Word) -> Word {
    debug_assert_eq!(z.len(), x.len());
    let mut carry = 0;
    for (zi, &xi) in z.iter_mut().zip(x) {
        let (lo, hi) = mul_wide(xi, y);
        let (s, c1) = add_with_carry(lo, *zi, 0);
        let (s, c2) = add_with_carry(s, carry, 0);
        *zi = s;
        carry = hi + c1 + c2;
    }
    carry
}

/// Shift z left by `s < 64` bits in place, returning the bits shifted out.
pub fn shl_assign(z: &mut [Word], s: u32) -> Word {
    if s == 0 {
        return 0;
    }
    debug_assert!(s < 64);
    let mut carry = 0;
    for limb in z.iter_mut() {
        let next = *limb >> (64 - s);
        *limb = (*limb << s) | carry;
        carry = next;
    }
    carry
}

/// Write `x << s` (`s < 64`) into z, which must be one word longer than x.
pub fn shl_into(z: &mut [Word], x: &[Word], s: u32) {
    debug_assert_eq!(z.len(), x.len() + 1);
    if s == 0 {
        z[..x.len()].copy_from_slice(x);
        z[x.len()] = 0;
        return;
    }
    let mut carry = 0;
    for (zi, &xi) in z.iter_mut().zip(x) {
        *zi = (xi << s) | carry;
        carry = xi >> (64 - s);
    }
    z[x.len()] = carry;
}

/// Compare two equal-length slices as numbers.
#[must_use]
pub fn cmp_vv(x: &[Word], y: &[Word]) -> std::cmp::Ordering {
    debug_assert_eq!(x.len(), y.len());
    x.iter().rev().cmp(y.iter().rev())
}
