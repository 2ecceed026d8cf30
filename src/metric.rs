//! Hamming metric over fingerprints

use crate::model::Fingerprint;

/// Number of differing bits between `a` and `b`
///
/// Pure and commutative, and satisfies the triangle inequality, which the
/// tree's pruning relies on.
#[inline]
pub fn distance(a: &Fingerprint, b: &Fingerprint) -> u32 {
    let (a, b) = (a.words(), b.words());
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Number of set bits
#[inline]
pub fn popcount(v: &Fingerprint) -> u32 {
    v.words().iter().map(|w| w.count_ones()).sum()
}
