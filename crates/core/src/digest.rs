//! Content digests used to key uploads, objects and catalog records.

use md5::{Digest, Md5};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a digest in raw bytes.
pub const DIGEST_LEN: usize = 16;

/// Length of a digest rendered as hex.
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

/// A 128-bit MD5 content digest.
///
/// The hex form is the identity of a file everywhere in the system: it names the
/// staging directory, forms part of the object path and is the catalog primary key.
/// Parsing is case-insensitive; rendering is always lowercase.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Create a digest from raw bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Compute the digest of a byte slice.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = DigestHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Parse from a 32-character hex string (either case).
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(crate::Error::InvalidDigest(format!(
                "expected {DIGEST_HEX_LEN} hex chars, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(crate::Error::InvalidDigest(format!("not hex: {s}")));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        for (i, pair) in s.as_bytes().chunks(2).enumerate() {
            let hex_str = std::str::from_utf8(pair)
                .map_err(|e| crate::Error::InvalidDigest(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|_| crate::Error::InvalidDigest(format!("not hex: {s}")))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl FromStr for ContentDigest {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental digest computation over a byte stream.
#[derive(Default)]
pub struct DigestHasher(Md5);

impl DigestHasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self(Md5::new())
    }

    /// Feed more data.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> ContentDigest {
        ContentDigest(self.0.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // md5("hello world")
        let digest = ContentDigest::compute(b"hello world");
        assert_eq!(digest.to_hex(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_from_hex_is_case_insensitive() {
        let lower = ContentDigest::from_hex("5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
        let upper = ContentDigest::from_hex("5EB63BBBE01EEED093CB22BB8F5ACDC3").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.to_string(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(ContentDigest::from_hex("abc").is_err());
        assert!(ContentDigest::from_hex("zz63bbbe01eeed093cb22bb8f5acdc3z").is_err());
        assert!(ContentDigest::from_hex("../../../../../../../../etc/pass").is_err());
    }

    #[test]
    fn test_from_hex_rejects_signed_pairs() {
        assert!(ContentDigest::from_hex(&"+f".repeat(16)).is_err());
        assert!(ContentDigest::from_hex(&"-0".repeat(16)).is_err());
        assert!(ContentDigest::from_hex(&"0f".repeat(16)).is_ok());
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = DigestHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), ContentDigest::compute(b"hello world"));
    }

    #[test]
    fn test_serde_uses_hex() {
        let digest = ContentDigest::compute(b"x");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let parsed: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, digest);
    }
}
