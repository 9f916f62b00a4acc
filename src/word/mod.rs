//! Fixed-width two's-complement word primitives.
//!
//! Every register and memory word is stored as an unsigned `u64`. The
//! helpers here convert to and from the signed interpretation and perform
//! addition and subtraction with signed-overflow detection:
//! - [`to_signed`] / [`to_unsigned`] - bijection between storage and value
//! - [`add_overflowing`] / [`sub_overflowing`] - truncating arithmetic
//! - [`negate`] - two's-complement negation

pub mod arith;

pub use arith::{add_overflowing, sub_overflowing, negate, to_signed, to_unsigned, is_negative};

/// Width of a machine word in bits.
pub const WORD_BITS: u32 = 64;

/// Size of a machine word in bytes.
pub const WORD_BYTES: usize = 8;
