//! 128-bit hashes for build caching and compatibility checks.
//!
//! A `Hash128` is the first 16 bytes of a SHA-256 digest, displayed as hex.
//! Content hashes key the incremental-build cache; layout hashes let a
//! runtime loader detect binary-format incompatibility.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// A 128-bit hash value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash128([u8; 16]);

/// Errors parsing a `Hash128` from hex.
#[derive(Debug, Error)]
pub enum HashParseError {
    #[error("hash must be 32 hex characters, got {0}")]
    BadLength(usize),

    #[error("invalid hex: {0}")]
    BadHex(#[from] hex::FromHexError),
}

impl Hash128 {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Hash128(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parse from a 32-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        if s.len() != 32 {
            return Err(HashParseError::BadLength(s.len()));
        }
        let raw = hex::decode(s)?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&raw);
        Ok(Hash128(bytes))
    }

    /// Hash a single byte slice.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Hasher128::new();
        hasher.update(data);
        hasher.finish()
    }
}

impl fmt::Display for Hash128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for Hash128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash128 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash128::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Incremental 128-bit hasher over a SHA-256 stream.
#[derive(Default)]
pub struct Hasher128 {
    inner: Sha256,
}

impl Hasher128 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finish(self) -> Hash128 {
        let digest = self.inner.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Hash128(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(Hash128::of(b"content"), Hash128::of(b"content"));
        assert_ne!(Hash128::of(b"content"), Hash128::of(b"other"));
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = Hasher128::new();
        hasher.update(b"con");
        hasher.update(b"tent");
        assert_eq!(hasher.finish(), Hash128::of(b"content"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = Hash128::of(b"roundtrip");
        let s = h.to_string();
        assert_eq!(s.len(), 32);
        assert_eq!(Hash128::from_hex(&s).unwrap(), h);
    }

    #[test]
    fn test_from_hex_rejects_bad_length() {
        assert!(matches!(
            Hash128::from_hex("abcd"),
            Err(HashParseError::BadLength(4))
        ));
    }
}
