//! The 128-bit fingerprint type.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 128-bit content fingerprint.
///
/// Stored as a native `u128` so it can key a `HashMap` directly. The four
/// 32-bit words are numbered from the least significant one; word 3 is
/// printed first in the textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PayloadHash(pub u128);

impl PayloadHash {
    /// Size of the little-endian byte form.
    pub const SIZE: usize = 16;

    /// Length of the hex form.
    pub const HEX_LEN: usize = 32;

    /// Creates a hash from its raw value.
    #[must_use]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Builds a hash from four words, least significant first.
    #[must_use]
    pub const fn from_words(words: [u32; 4]) -> Self {
        Self(
            (words[0] as u128)
                | ((words[1] as u128) << 32)
                | ((words[2] as u128) << 64)
                | ((words[3] as u128) << 96),
        )
    }

    /// Returns the four words, least significant first.
    #[must_use]
    pub const fn words(self) -> [u32; 4] {
        [
            self.0 as u32,
            (self.0 >> 32) as u32,
            (self.0 >> 64) as u32,
            (self.0 >> 96) as u32,
        ]
    }

    /// Builds a hash from its two 64-bit halves.
    #[must_use]
    pub const fn from_halves(low: u64, high: u64) -> Self {
        Self((low as u128) | ((high as u128) << 64))
    }

    /// Little-endian byte form, as stored inside STREAM entries.
    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    /// Parses the little-endian byte form.
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_le_bytes(bytes))
    }

    /// Decodes a packed list of little-endian hashes.
    ///
    /// Returns `None` if `data` is not a whole number of hashes.
    #[must_use]
    pub fn list_from_bytes(data: &[u8]) -> Option<Vec<Self>> {
        if data.len() % Self::SIZE != 0 {
            return None;
        }
        Some(
            data.chunks_exact(Self::SIZE)
                .map(|c| {
                    let mut bytes = [0u8; 16];
                    bytes.copy_from_slice(c);
                    Self::from_le_bytes(bytes)
                })
                .collect(),
        )
    }

    /// Packs a list of hashes into their little-endian byte form.
    #[must_use]
    pub fn list_to_bytes(hashes: &[Self]) -> Vec<u8> {
        let mut out = Vec::with_capacity(hashes.len() * Self::SIZE);
        for hash in hashes {
            out.extend_from_slice(&hash.to_le_bytes());
        }
        out
    }
}

impl From<u128> for PayloadHash {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<PayloadHash> for u128 {
    fn from(hash: PayloadHash) -> Self {
        hash.0
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Error returned when parsing a hex fingerprint fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid payload hash {input:?}: expected 32 hex digits")]
pub struct ParseHashError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for PayloadHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseHashError {
                input: s.to_string(),
            });
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseHashError {
                input: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_roundtrip() {
        let hash = PayloadHash::from_words([1, 2, 3, 4]);
        assert_eq!(hash.words(), [1, 2, 3, 4]);
        assert_eq!(hash.as_u128(), 0x0000_0004_0000_0003_0000_0002_0000_0001);
    }

    #[test]
    fn display_is_most_significant_word_first() {
        let hash = PayloadHash::from_words([0xdddd_dddd, 0xcccc_cccc, 0xbbbb_bbbb, 0xaaaa_aaaa]);
        assert_eq!(hash.to_string(), "aaaaaaaabbbbbbbbccccccccdddddddd");
    }

    #[test]
    fn parse_hex() {
        let hash: PayloadHash = "0000000000000000000000000000002a".parse().unwrap();
        assert_eq!(hash, PayloadHash::new(42));

        let upper: PayloadHash = "ABCDEF00000000000000000000000000".parse().unwrap();
        assert_eq!(upper.words()[3], 0xabcd_ef00);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("123".parse::<PayloadHash>().is_err());
        assert!(format!("+{}", "0".repeat(31)).parse::<PayloadHash>().is_err());
        assert!("g000000000000000000000000000002a".parse::<PayloadHash>().is_err());
    }

    #[test]
    fn halves() {
        let hash = PayloadHash::from_halves(0x1111, 0x2222);
        assert_eq!(hash.as_u128() as u64, 0x1111);
        assert_eq!((hash.as_u128() >> 64) as u64, 0x2222);
    }

    #[test]
    fn hash_list_bytes() {
        let hashes = vec![PayloadHash::new(1), PayloadHash::new(u128::MAX)];
        let bytes = PayloadHash::list_to_bytes(&hashes);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 1);
        assert_eq!(PayloadHash::list_from_bytes(&bytes).unwrap(), hashes);
        assert!(PayloadHash::list_from_bytes(&bytes[..17]).is_none());
    }
}
