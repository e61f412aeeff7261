//! # Error Types
//!
//! Leaf error types shared by every Ratebook crate. Subsystem crates define
//! their own `thiserror` enums and wrap these with `#[from]`.
//!
//! - Canonicalization errors carry the offending value.
//! - Validation errors carry the rejected input and the expected format.
//! - Integrity errors carry both checksums so operators can tell storage
//!   corruption from an out-of-band edit.

use thiserror::Error;

use crate::checksum::Checksum;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Non-integer numbers have no canonical form. Money is a decimal string.
    #[error("non-integer number {value} at {path}; write decimals as strings")]
    FloatRejected { path: String, value: f64 },

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation failures for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Currency is not a three-letter uppercase ISO 4217 code.
    #[error("invalid currency code \"{0}\" (expected three uppercase letters, e.g. USD)")]
    InvalidCurrency(String),

    /// RuleSet code is empty, too long, or has characters outside `[A-Za-z0-9._-]`.
    #[error("invalid ruleset code \"{0}\" (expected 1-64 characters from [A-Za-z0-9._-])")]
    InvalidRuleSetCode(String),

    /// Checksum string could not be parsed.
    #[error("invalid checksum \"{value}\": {reason}")]
    InvalidChecksum {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Timestamp string could not be parsed or was not UTC.
    #[error("invalid timestamp \"{value}\": {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Identifier string is not a UUID.
    #[error("invalid identifier \"{0}\" (expected a UUID)")]
    InvalidIdentifier(String),
}

/// A stored checksum no longer matches the data it was computed over.
///
/// Always fatal. Signals storage corruption or an out-of-band mutation of a
/// published policy; evaluation must stop rather than produce a price.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("integrity violation on {subject}: stored checksum {expected}, recomputed {actual}")]
pub struct IntegrityError {
    /// What was being verified (e.g. `ruleset ACME-STD v3`).
    pub subject: String,
    /// Checksum on record.
    pub expected: Checksum,
    /// Checksum recomputed from the current data.
    pub actual: Checksum,
}
