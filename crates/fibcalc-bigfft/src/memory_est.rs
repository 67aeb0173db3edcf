//! Memory estimation for FFT operations.
//!
//! Estimates saturate at `usize::MAX` for sizes no machine could hold.

use fibcalc_memory::WORD_BITS;

use crate::fermat::{fft_size, value_size};

/// Estimate peak temporary bytes for one FFT multiplication of operands
/// with the given bit lengths.
#[must_use]
pub fn estimate_fft_memory(a_bits: usize, b_bits: usize) -> usize {
    let (k, m) = fft_size(a_bits.div_ceil(WORD_BITS), b_bits.div_ceil(WORD_BITS));
    let n = value_size(k, m);
    let vector_bytes = vector_bytes(k, n);

    // Two operand transforms, the padded source and the product vector.
    let transforms = vector_bytes.saturating_mul(4);
    // Per-worker scratch elements and the double-width fold buffer.
    transforms.saturating_add(scratch_bytes(n))
}

/// Estimate peak temporary bytes for one FFT squaring.
#[must_use]
pub fn estimate_fft_sqr_memory(bits: usize) -> usize {
    let (k, m) = fft_size(bits.div_ceil(WORD_BITS), bits.div_ceil(WORD_BITS));
    let n = value_size(k, m);
    vector_bytes(k, n)
        .saturating_mul(3)
        .saturating_add(scratch_bytes(n))
}

fn vector_bytes(k: u32, n: usize) -> usize {
    (1usize << k).saturating_mul(n.saturating_add(1)).saturating_mul(8)
}

fn scratch_bytes(n: usize) -> usize {
    n.saturating_add(1).saturating_mul(2 * 8 * 4)
}
