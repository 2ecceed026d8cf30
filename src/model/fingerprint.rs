//! Fixed-width bit-vector fingerprint

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fingerprint of up to 256 bits, stored big-endian
///
/// Trees are configured with a width `W`; a fingerprint belongs to such a
/// tree only if no bit at position `W` or above is set (see [`Fingerprint::fits`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub const ZERO: Fingerprint = Fingerprint([0u8; 32]);

    /// Widest supported fingerprint, in bits
    pub const MAX_WIDTH: u16 = 256;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Fingerprint(bytes)
    }

    pub fn from_u128(v: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&v.to_be_bytes());
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from hex, left-padding to 256 bits
    ///
    /// Accepts an optional `0x` prefix and up to 64 digits.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if s.is_empty() || s.len() > 64 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let padded = format!("{:0>64}", s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(padded, &mut bytes)?;
        Ok(Fingerprint(bytes))
    }

    /// Full 64-digit hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Zero-padded hex sized for a `width`-bit tree
    ///
    /// Never drops significant digits, even for values wider than `width`.
    pub fn to_hex_width(&self, width: u16) -> String {
        let full = self.to_hex();
        let wanted = (width as usize).div_ceil(4);
        let significant = (self.bit_len() as usize).div_ceil(4);
        let digits = wanted.max(significant).clamp(1, 64);
        full[64 - digits..].to_string()
    }

    /// Hex with only the significant digits, at least one
    pub fn to_hex_min(&self) -> String {
        // a one-digit width never pads
        self.to_hex_width(4)
    }

    /// Position of the highest set bit plus one (0 for the zero value)
    pub fn bit_len(&self) -> u32 {
        let words = self.words();
        for (i, w) in words.iter().enumerate() {
            if *w != 0 {
                return (4 - i as u32) * 64 - w.leading_zeros();
            }
        }
        0
    }

    /// Whether this value can be stored in a `width`-bit tree
    pub fn fits(&self, width: u16) -> bool {
        self.bit_len() <= width as u32
    }

    /// Big-endian 64-bit words, most significant first
    pub fn words(&self) -> [u64; 4] {
        let mut words = [0u64; 4];
        for (word, chunk) in words.iter_mut().zip(self.0.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *word = u64::from_be_bytes(buf);
        }
        words
    }

    pub fn xor(&self, other: &Self) -> Self {
        let mut out = [0u8; 32];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a ^ b;
        }
        Fingerprint(out)
    }

    /// Flip bit `i` (0 = least significant)
    pub fn with_bit_flipped(&self, i: u16) -> Self {
        let mut out = self.0;
        let i = i as usize % 256;
        out[31 - i / 8] ^= 1 << (i % 8);
        Fingerprint(out)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex_min())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Fingerprint::ZERO
    }
}

impl FromStr for Fingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fingerprint::from_hex(s)
    }
}

impl From<u128> for Fingerprint {
    fn from(v: u128) -> Self {
        Fingerprint::from_u128(v)
    }
}
