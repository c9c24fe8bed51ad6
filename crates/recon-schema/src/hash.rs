//! Structural schema hashing
//!
//! Provides [`SchemaHash`], a 32-byte Blake3 digest of a template's
//! structure. Two issues built from the same master share a hash no matter
//! which figures they carry.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::canonical::canonical_json;

/// A 32-byte structural hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaHash([u8; 32]);

impl SchemaHash {
    /// Wrap raw digest bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash arbitrary bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a JSON value through its canonical (sorted-key) encoding
    #[must_use]
    pub fn of_value(value: &serde_json::Value) -> Self {
        Self::compute(canonical_json(value).as_bytes())
    }

    /// First 16 hex chars, for logs
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for SchemaHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for SchemaHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(HashError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl serde::Serialize for SchemaHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for SchemaHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors parsing a stored schema hash
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Wrong digest length
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Not hex
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_hash() {
        let a = SchemaHash::of_value(&json!({"b": 1, "a": [1, 2]}));
        let b = SchemaHash::of_value(&json!({"a": [1, 2], "b": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn display_parses_back() {
        let hash = SchemaHash::compute(b"columns");
        let parsed: SchemaHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
        assert!(hash.to_string().starts_with(&hash.short()));
    }

    #[test]
    fn short_input_is_rejected() {
        let result = "abcd".parse::<SchemaHash>();
        assert!(matches!(
            result,
            Err(HashError::InvalidLength {
                expected: 32,
                actual: 2
            })
        ));
    }

    #[test]
    fn serde_uses_hex_string() {
        let hash = SchemaHash::compute(b"grid");
        let encoded = serde_json::to_string(&hash).unwrap();
        assert_eq!(encoded.len(), 66);
        let decoded: SchemaHash = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, hash);
    }
}
