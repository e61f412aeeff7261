//! # Identity Newtypes
//!
//! Each identifier is a distinct type. You cannot pass a [`QuoteId`] where a
//! [`RuleSetId`] is expected, and a RuleSet lookup cannot forget its tenant
//! because [`FirmId`] is a required argument everywhere.
//!
//! UUID-based identifiers are always valid by construction. [`RuleSetCode`]
//! validates its format at construction time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidIdentifier(s.to_string()))
            }
        }
    };
}

uuid_identifier!(
    /// The tenant (firm) every RuleSet and Quote belongs to.
    FirmId,
    "firm"
);

uuid_identifier!(
    /// Opaque identifier of one stored RuleSet (one `(code, version)` pair).
    RuleSetId,
    "ruleset"
);

uuid_identifier!(
    /// Identifier of a Quote container.
    QuoteId,
    "quote"
);

uuid_identifier!(
    /// Identifier of an immutable QuoteVersion snapshot.
    QuoteVersionId,
    "quote-version"
);

/// Business code naming a pricing policy, e.g. `STANDARD-2026`.
///
/// Together with the firm and a version number it forms a RuleSet's
/// natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleSetCode(String);

impl RuleSetCode {
    /// Validate and wrap a RuleSet code.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        let well_formed = !code.is_empty()
            && code.len() <= 64
            && code
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if well_formed {
            Ok(Self(code))
        } else {
            Err(ValidationError::InvalidRuleSetCode(code))
        }
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuleSetCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RuleSetCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RuleSetCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RuleSetCode> for String {
    fn from(value: RuleSetCode) -> Self {
        value.0
    }
}
