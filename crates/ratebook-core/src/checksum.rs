//! # Rule Checksums
//!
//! A `Checksum` is a SHA-256 digest over the canonical bytes of a rule tree,
//! tagged with its algorithm. It renders as `sha256:<64 lowercase hex>` and
//! parses back from that form, so it can travel through JSON snapshots,
//! HTTP bodies and CLI flags without a second encoding.
//!
//! ## Invariant
//!
//! `Checksum::compute()` is the only way to derive a checksum from data, and
//! it always routes through [`CanonicalBytes`]. Structurally equal rule trees
//! therefore always share a checksum.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::{CanonicalizationError, ValidationError};

/// Hash algorithm behind a checksum.
///
/// Only SHA-256 exists today. Stored checksums always carry the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
}

impl ChecksumAlgorithm {
    /// Returns the algorithm prefix used in the string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content checksum over canonicalized rule data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    bytes: [u8; 32],
}

impl Checksum {
    /// Canonicalize `data` and hash the result.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures (non-integer numbers, values
    /// serde cannot express as JSON).
    pub fn compute(data: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let canonical = CanonicalBytes::new(data)?;
        Ok(Self::of(&canonical))
    }

    /// Hash bytes that have already been canonicalized.
    pub fn of(canonical: &CanonicalBytes) -> Self {
        let hash = Sha256::digest(canonical.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self {
            algorithm: ChecksumAlgorithm::Sha256,
            bytes,
        }
    }

    /// Recompute over `data` and compare with `self`.
    pub fn matches(&self, data: &impl Serialize) -> Result<bool, CanonicalizationError> {
        Ok(Self::compute(data)? == *self)
    }

    /// The algorithm that produced this checksum.
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Render the digest as lowercase hex, without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl FromStr for Checksum {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidChecksum {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (prefix, hex) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected <algorithm>:<hex>"))?;
        let algorithm = match prefix {
            "sha256" => ChecksumAlgorithm::Sha256,
            _ => return Err(invalid("unknown algorithm")),
        };
        if hex.len() != 64 {
            return Err(invalid("expected 64 hex characters"));
        }
        if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(invalid("expected lowercase hex"));
        }

        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| invalid("expected lowercase hex"))?;
        }
        Ok(Self { algorithm, bytes })
    }
}

impl TryFrom<String> for Checksum {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Checksum> for String {
    fn from(value: Checksum) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn compute_is_deterministic() {
        let mut data = BTreeMap::new();
        data.insert("a", 1);
        data.insert("b", 2);
        assert_eq!(Checksum::compute(&data).unwrap(), Checksum::compute(&data).unwrap());
    }

    #[test]
    fn known_vector_for_empty_object() {
        // SHA256("{}")
        let checksum = Checksum::compute(&serde_json::json!({})).unwrap();
        assert_eq!(
            checksum.to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert_eq!(checksum.algorithm(), ChecksumAlgorithm::Sha256);
    }

    #[test]
    fn key_order_does_not_change_checksum() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"b":{"y":1,"x":2},"a":"1000.00"}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{ "a": "1000.00", "b": { "x": 2, "y": 1 } }"#).unwrap();
        assert_eq!(Checksum::compute(&a).unwrap(), Checksum::compute(&b).unwrap());
    }

    #[test]
    fn single_character_change_changes_checksum() {
        let a = serde_json::json!({"unit_price": "1000.00"});
        let b = serde_json::json!({"unit_price": "1000.01"});
        assert_ne!(Checksum::compute(&a).unwrap(), Checksum::compute(&b).unwrap());
    }

    #[test]
    fn display_has_algorithm_prefix() {
        let checksum = Checksum::compute(&serde_json::json!({"a": 1})).unwrap();
        let s = checksum.to_string();
        assert!(s.starts_with("sha256:"));
        assert_eq!(s.len(), 7 + 64);
    }

    #[test]
    fn parses_its_own_display_form() {
        let checksum = Checksum::compute(&serde_json::json!({"a": 1})).unwrap();
        let parsed: Checksum = checksum.to_string().parse().unwrap();
        assert_eq!(parsed, checksum);
    }

    #[test]
    fn serde_uses_string_form() {
        let checksum = Checksum::compute(&serde_json::json!({})).unwrap();
        let json = serde_json::to_string(&checksum).unwrap();
        assert_eq!(
            json,
            "\"sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a\""
        );
        let back: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checksum);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("sha256".parse::<Checksum>().is_err());
        assert!("md5:44136fa355b3678a1146ad16f7e8649e".parse::<Checksum>().is_err());
        assert!("sha256:abc".parse::<Checksum>().is_err());
        let upper = "sha256:44136FA355B3678A1146AD16F7E8649E94FB4FC21FE77E8310C060F61CAAFF8A";
        assert!(upper.parse::<Checksum>().is_err());
    }

    #[test]
    fn matches_detects_divergence() {
        let rules = serde_json::json!({"products": []});
        let checksum = Checksum::compute(&rules).unwrap();
        assert!(checksum.matches(&rules).unwrap());
        assert!(!checksum.matches(&serde_json::json!({"products": [1]})).unwrap());
    }
}
