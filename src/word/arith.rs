//! Width-parameterised two's-complement arithmetic.
//!
//! All functions take a bit width in `1..=64` and treat their inputs as
//! unsigned storage values of that width. Bits above the width are ignored
//! and results are always truncated back into range.

/// Mask selecting the low `bits` bits of a word.
#[inline]
fn mask(bits: u32) -> u64 {
    debug_assert!((1..=64).contains(&bits), "bit width {} out of range", bits);
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Whether the sign bit of a `bits`-wide value is set.
#[inline]
pub fn is_negative(value: u64, bits: u32) -> bool {
    (value >> (bits - 1)) & 1 == 1
}

/// Interpret an unsigned storage value as a signed two's-complement number.
pub fn to_signed(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Convert a signed value into its unsigned `bits`-wide storage form.
pub fn to_unsigned(value: i64, bits: u32) -> u64 {
    (value as u64) & mask(bits)
}

/// Two's-complement negation: complement plus one, truncated.
pub fn negate(value: u64, bits: u32) -> u64 {
    (!value).wrapping_add(1) & mask(bits)
}

/// Add two words modulo `2^bits`, returning `(result, overflowed)`.
///
/// Overflow is set when both operands carry the same sign and the result's
/// sign differs from it. Unsigned carry out of the top bit is not overflow.
pub fn add_overflowing(a: u64, b: u64, bits: u32) -> (u64, bool) {
    let a = a & mask(bits);
    let b = b & mask(bits);
    let result = a.wrapping_add(b) & mask(bits);

    let sign_a = is_negative(a, bits);
    let sign_b = is_negative(b, bits);
    let sign_r = is_negative(result, bits);

    (result, sign_a == sign_b && sign_a != sign_r)
}

/// Subtract `b` from `a` as `a + (-b)`, returning `(result, overflowed)`.
///
/// For `b` equal to the most negative value the negation is `b` itself, so
/// the flag follows the addition rule rather than true signed subtraction.
pub fn sub_overflowing(a: u64, b: u64, bits: u32) -> (u64, bool) {
    add_overflowing(a, negate(b, bits), bits)
}
