//! Keyed permutations for randomised cache indexing.
//!
//! The encrypted-index cache variants (CEASER, CEASER-S, scatter, phantom)
//! consume a 64-bit keyed pseudo-random permutation. Speck fills that role:
//! it has a 64-bit block variant, a cheap fixed key schedule, and no data
//! other than the tag flows through it. Nothing here aims at cryptographic
//! service quality; the permutation only has to make set indices
//! unpredictable without the key.

/// Speck block cipher (64- and 128-bit block variants).
pub mod speck;

pub use speck::{Speck64, Speck128};
