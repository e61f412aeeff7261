//! # RuleSet Record
//!
//! A named, versioned pricing policy and its lifecycle state.
//!
//! ```text
//! Draft ──publish──▶ Published ──deprecate──▶ Deprecated
//!   ▲  │
//!   └──┘ update (rules only)
//! ```
//!
//! Once published, every field except `status` and the timestamp the
//! transition sets is frozen. Deprecated RuleSets stay readable forever so
//! that historical quotes can be reproduced.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ratebook_core::{
    CanonicalizationError, Checksum, Currency, FirmId, IntegrityError, RuleSetCode, RuleSetId,
    Timestamp,
};
use ratebook_schema::SchemaVersion;

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle state of a RuleSet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSetStatus {
    /// Editable; not usable for new quotes.
    Draft,
    /// Frozen; usable for new quotes.
    Published,
    /// Frozen; readable for reproduction only (terminal).
    Deprecated,
}

impl RuleSetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Deprecated => "deprecated",
        }
    }

    /// Whether content fields may still change.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// The only legal status changes. Staying in place is always allowed.
    pub fn can_transition_to(&self, next: RuleSetStatus) -> bool {
        *self == next
            || matches!(
                (self, next),
                (Self::Draft, Self::Published) | (Self::Published, Self::Deprecated)
            )
    }
}

impl std::fmt::Display for RuleSetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Revision ────────────────────────────────────────────────────────

/// Optimistic concurrency token, bumped on every successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    pub const INITIAL: Revision = Revision(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Value reference ────────────────────────────────────────────────

/// The by-value identity of a RuleSet as recorded by its consumers.
///
/// A QuoteVersion stores this triple, never a pointer to the live record, so
/// it stays meaningful after the RuleSet is deprecated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleSetRef {
    pub ruleset_id: RuleSetId,
    pub ruleset_version: u32,
    pub ruleset_checksum: Checksum,
}

// ─── RuleSet ─────────────────────────────────────────────────────────

/// A stored pricing policy.
///
/// `rules` is the raw rule tree exactly as authored; `checksum` covers its
/// canonical bytes. Compatibility shims never touch either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: RuleSetId,
    pub firm_id: FirmId,
    pub code: RuleSetCode,
    /// Business version, unique per `(firm_id, code)`.
    pub version: u32,
    pub schema_version: SchemaVersion,
    pub default_currency: Currency,
    pub rules: Value,
    pub checksum: Checksum,
    pub status: RuleSetStatus,
    pub created_at: Timestamp,
    pub published_at: Option<Timestamp>,
    pub deprecated_at: Option<Timestamp>,
    pub revision: Revision,
}

impl RuleSet {
    /// Human-readable subject used in logs and integrity errors.
    pub fn subject(&self) -> String {
        format!("ruleset {} v{}", self.code, self.version)
    }

    pub fn reference(&self) -> RuleSetRef {
        RuleSetRef {
            ruleset_id: self.id,
            ruleset_version: self.version,
            ruleset_checksum: self.checksum,
        }
    }

    /// Checksum of the rules as they are now.
    pub fn computed_checksum(&self) -> Result<Checksum, CanonicalizationError> {
        Checksum::compute(&self.rules)
    }

    /// Whether the stored checksum still covers the stored rules.
    pub fn verify_checksum(&self) -> Result<bool, CanonicalizationError> {
        self.checksum.matches(&self.rules)
    }

    /// Verify that the stored checksum covers the rules and equals `expected`.
    ///
    /// Used before every evaluation (`expected` = the record's own checksum)
    /// and on reproduction (`expected` = the checksum copied into a quote).
    pub fn ensure_integrity(&self, expected: &Checksum) -> Result<(), RuleSetIntegrityError> {
        let actual = self.computed_checksum()?;
        if actual != *expected || actual != self.checksum {
            return Err(RuleSetIntegrityError::Mismatch(IntegrityError {
                subject: self.subject(),
                expected: *expected,
                actual,
            }));
        }
        Ok(())
    }
}

/// Failure to establish that a RuleSet's rules are intact.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RuleSetIntegrityError {
    #[error(transparent)]
    Mismatch(#[from] IntegrityError),

    /// The stored rules can no longer be canonicalized at all.
    #[error("stored rules cannot be canonicalized: {0}")]
    Uncanonicalizable(String),
}

impl From<CanonicalizationError> for RuleSetIntegrityError {
    fn from(e: CanonicalizationError) -> Self {
        Self::Uncanonicalizable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RuleSet {
        let rules = json!({
            "schema_version": "1.0.0",
            "products": [{"code": "BASIC", "unit_price": "1000.00"}]
        });
        RuleSet {
            id: RuleSetId::new(),
            firm_id: FirmId::new(),
            code: RuleSetCode::new("STANDARD").unwrap(),
            version: 1,
            schema_version: SchemaVersion::new(1, 0, 0),
            default_currency: Currency::new("USD").unwrap(),
            checksum: Checksum::compute(&rules).unwrap(),
            rules,
            status: RuleSetStatus::Draft,
            created_at: Timestamp::now(),
            published_at: None,
            deprecated_at: None,
            revision: Revision::INITIAL,
        }
    }

    #[test]
    fn legal_transitions() {
        use RuleSetStatus::*;
        assert!(Draft.can_transition_to(Published));
        assert!(Published.can_transition_to(Deprecated));
        assert!(Published.can_transition_to(Published));
        assert!(!Draft.can_transition_to(Deprecated));
        assert!(!Deprecated.can_transition_to(Published));
        assert!(!Published.can_transition_to(Draft));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RuleSetStatus::Published).unwrap(), "\"published\"");
    }

    #[test]
    fn fresh_record_verifies() {
        let rs = sample();
        assert!(rs.verify_checksum().unwrap());
        rs.ensure_integrity(&rs.checksum).unwrap();
    }

    #[test]
    fn tampered_rules_fail_integrity() {
        let mut rs = sample();
        rs.rules["products"][0]["unit_price"] = json!("1.00");
        assert!(!rs.verify_checksum().unwrap());
        let err = rs.ensure_integrity(&rs.checksum).unwrap_err();
        match err {
            RuleSetIntegrityError::Mismatch(e) => {
                assert_eq!(e.expected, rs.checksum);
                assert!(e.subject.contains("STANDARD v1"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn foreign_checksum_fails_integrity() {
        let rs = sample();
        let other = Checksum::compute(&json!({"x": 1})).unwrap();
        assert!(rs.ensure_integrity(&other).is_err());
    }

    #[test]
    fn reference_copies_identity() {
        let rs = sample();
        let r = rs.reference();
        assert_eq!(r.ruleset_id, rs.id);
        assert_eq!(r.ruleset_version, 1);
        assert_eq!(r.ruleset_checksum, rs.checksum);
    }
}
