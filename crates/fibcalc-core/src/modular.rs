//! Modular Fast Doubling for last-digits mode.
//!
//! Runs the doubling recursion with every intermediate reduced modulo `m`,
//! so memory stays O(log m) whatever the index. Moduli that fit in a `u64`
//! use `u128` intermediates; larger ones go through the multiplication
//! tier.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};

use crate::calculator::{Calculator, FibError};
use crate::constants::MAX_LAST_DIGITS;
use crate::observer::{FrozenObserver, ProgressObserver};
use crate::progress::{step_fraction, CancellationToken, ProgressUpdate};
use crate::strategy::{Multiplier, TieredMultiplier};

const NAME: &str = "ModularFastDoubling";

/// Compute F(n) mod `modulus`, with `0 <= result < modulus`.
///
/// # Errors
///
/// `InvalidInput` when `modulus <= 0`; `Cancelled`/`Timeout` from the token.
pub fn fibonacci_mod(
    n: u64,
    modulus: &BigInt,
    cancel: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<BigUint, FibError> {
    if modulus.sign() != Sign::Plus {
        return Err(FibError::InvalidInput(format!(
            "modulus must be positive, got {modulus}"
        )));
    }
    let m = modulus.magnitude();
    let result = match m.to_u64() {
        Some(m64) => BigUint::from(fib_mod_u64(n, m64, cancel, observer)?),
        None => fib_mod_big(n, m, cancel, observer)?,
    };
    observer.on_progress(&ProgressUpdate::done(NAME));
    Ok(result)
}

/// Last `k` decimal digits of F(n), as a number in `[0, 10^k)`.
///
/// Leading zeros are the caller's to add back for display.
pub fn calculate_last_digits(
    n: u64,
    k: u32,
    cancel: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<BigUint, FibError> {
    if k > MAX_LAST_DIGITS {
        return Err(FibError::InvalidInput(format!(
            "at most {MAX_LAST_DIGITS} last digits can be requested, got {k}"
        )));
    }
    let modulus = BigInt::from(10u32).pow(k);
    fibonacci_mod(n, &modulus, cancel, observer)
}

fn report(frozen: &FrozenObserver, observer: &dyn ProgressObserver, done: u64, total: u64) {
    frozen.report(
        observer,
        &ProgressUpdate::new(NAME, step_fraction(done, total), done, total),
    );
}

fn fib_mod_u64(
    n: u64,
    m: u64,
    cancel: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<u64, FibError> {
    if m == 1 {
        return Ok(0);
    }
    let m = u128::from(m);
    let total = u64::from(64 - n.leading_zeros());
    let frozen = observer.freeze();
    let (mut fk, mut fk1) = (0u128, 1u128);

    for i in (0..total).rev() {
        cancel.check()?;

        let cross = fk * fk1 % m;
        let sq = fk * fk % m;
        let sq1 = fk1 * fk1 % m;
        // F(2k) = 2*F(k)*F(k+1) - F(k)^2, kept non-negative by adding m.
        let f2k = (2 * cross + m - sq) % m;
        let f2k1 = (sq1 + sq) % m;
        (fk, fk1) = (f2k, f2k1);

        if (n >> i) & 1 == 1 {
            (fk, fk1) = (fk1, (fk + fk1) % m);
        }
        report(&frozen, observer, total - i, total);
    }

    // fk < m <= u64::MAX
    u64::try_from(fk)
        .map_err(|_| FibError::InternalArithmeticFault("residue exceeds modulus".into()))
}

fn fib_mod_big(
    n: u64,
    m: &BigUint,
    cancel: &CancellationToken,
    observer: &dyn ProgressObserver,
) -> Result<BigUint, FibError> {
    let mult = TieredMultiplier::default();
    let total = u64::from(64 - n.leading_zeros());
    let frozen = observer.freeze();
    let mut fk = BigUint::zero();
    let mut fk1 = BigUint::from(1u32);

    for i in (0..total).rev() {
        cancel.check()?;

        let cross = mult.multiply(&fk, &fk1)? % m;
        let sq = mult.square(&fk)? % m;
        let sq1 = mult.square(&fk1)? % m;

        let double_cross = (cross << 1u32) % m;
        let f2k = if double_cross >= sq {
            double_cross - &sq
        } else {
            m - &sq + double_cross
        };
        let f2k1 = (sq1 + sq) % m;
        fk = f2k;
        fk1 = f2k1;

        if (n >> i) & 1 == 1 {
            let sum = (&fk + &fk1) % m;
            fk = std::mem::replace(&mut fk1, sum);
        }
        report(&frozen, observer, total - i, total);
    }

    Ok(fk)
}

/// Calculator returning the last `digits` decimal digits of F(n).
#[derive(Debug, Clone, Copy)]
pub struct LastDigits {
    digits: u32,
}

impl LastDigits {
    /// Calculator for the last `digits` digits.
    #[must_use]
    pub fn new(digits: u32) -> Self {
        Self { digits }
    }

    /// Number of digits computed.
    #[must_use]
    pub fn digits(&self) -> u32 {
        self.digits
    }
}

impl Calculator for LastDigits {
    fn calculate(
        &self,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
        n: u64,
    ) -> Result<BigUint, FibError> {
        calculate_last_digits(n, self.digits, cancel, observer)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
