//! Test utilities for tagheap development.
//!
//! Provides payload pattern helpers for detecting overwritten
//! allocations, and host memory fixtures (see [`fixtures`]) for forcing
//! growth failures at chosen points.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{GatedMemory, GrowthGate};

/// The byte expected at index `i` of a payload filled with `seed`.
///
/// Mixes the index into the seed so shifted or truncated copies do not
/// match by accident.
pub fn pattern_byte(seed: u64, i: usize) -> u8 {
    let x = seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(i as u64)
        .wrapping_mul(0xBF58_476D_1CE4_E5B9);
    (x >> 56) as u8
}

/// Fill `buf` with the pattern for `seed`.
pub fn fill_pattern(buf: &mut [u8], seed: u64) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b = pattern_byte(seed, i);
    }
}

/// Index of the first byte of `buf` that does not match the pattern.
pub fn first_mismatch(buf: &[u8], seed: u64) -> Option<usize> {
    buf.iter()
        .enumerate()
        .position(|(i, &b)| b != pattern_byte(seed, i))
}

/// Whether all of `buf` matches the pattern for `seed`.
pub fn check_pattern(buf: &[u8], seed: u64) -> bool {
    first_mismatch(buf, seed).is_none()
}
