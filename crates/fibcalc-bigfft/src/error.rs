//! Errors raised by the transform engine.

use thiserror::Error;

/// A violated ring or transform invariant.
///
/// These indicate a parameter-selection or reduction bug, never bad user
/// input: operands of any size have a valid parameter set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FftError {
    /// The ring 2^(64n)+1 cannot hold the convolution for this order and width.
    #[error("invalid transform parameters: k={k}, m={m}, n={n}")]
    InvalidParameters {
        /// Transform order.
        k: u32,
        /// Coefficient width in words.
        m: usize,
        /// Ring size in words.
        n: usize,
    },

    /// An operand does not fit in `2^k` coefficients of `m` words.
    #[error("operand of {words} words exceeds transform capacity of {capacity} words")]
    OperandTooLarge {
        /// Operand length in words.
        words: usize,
        /// Words representable by the polynomial.
        capacity: usize,
    },

    /// Two transforms with different parameters were combined.
    #[error("transform shape mismatch: (k={0}, n={1}) vs (k={2}, n={3})")]
    ShapeMismatch(u32, usize, u32, usize),

    /// Reassembly carried past the destination; a coefficient was not reduced.
    #[error("carry overflow during reassembly into {0} words")]
    CarryOverflow(usize),
}
