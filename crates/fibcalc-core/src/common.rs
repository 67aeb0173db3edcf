//! In-place limb helpers used by the doubling combine.

use fibcalc_bigfft::arith::{add_assign, shl_assign, sub_assign};
use fibcalc_memory::{Word, WordBuf};

use crate::calculator::FibError;

/// `z += x`, growing `z` by at most one word.
pub fn add_into<B: WordBuf + ?Sized>(z: &mut B, x: &[Word]) {
    let len = z.len().max(x.len()) + 1;
    z.resize_words(len);
    let carry = add_assign(z.words_mut(), x);
    debug_assert_eq!(carry, 0);
    z.normalize();
}

/// `z = 2*z - y`.
///
/// # Errors
///
/// `InternalArithmeticFault` when the result would be negative.
pub fn shl1_sub<B: WordBuf + ?Sized>(z: &mut B, y: &[Word]) -> Result<(), FibError> {
    let len = z.len() + 1;
    z.resize_words(len);
    let out = shl_assign(z.words_mut(), 1);
    debug_assert_eq!(out, 0);

    let y = &y[..fibcalc_memory::words::normalized_len(y)];
    if y.len() > z.len() {
        return Err(FibError::InternalArithmeticFault(
            "doubling difference went negative".into(),
        ));
    }
    if sub_assign(z.words_mut(), y) != 0 {
        return Err(FibError::InternalArithmeticFault(
            "doubling difference went negative".into(),
        ));
    }
    z.normalize();
    Ok(())
}
