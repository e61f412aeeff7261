//! # Record Timestamps
//!
//! RuleSet lifecycle instants (`created_at`, `published_at`,
//! `deprecated_at`) and QuoteVersion `created_at`. Always UTC, whole
//! seconds, and written as `YYYY-MM-DDTHH:MM:SSZ` on the wire.
//!
//! Timestamps never feed a checksum or an evaluation result.

use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC instant with whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().trunc_subsecs(0))
    }

    /// Parse `YYYY-MM-DDTHH:MM:SS[.fff]Z`. Offsets other than `Z` are
    /// rejected; fractional seconds are dropped.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidTimestamp {
            value: raw.to_string(),
            reason,
        };
        if !raw.ends_with('Z') {
            return Err(invalid("expected a UTC instant ending in Z".into()));
        }
        let parsed = DateTime::parse_from_rfc3339(raw).map_err(|e| invalid(e.to_string()))?;
        Ok(Self(parsed.with_timezone(&Utc).trunc_subsecs(0)))
    }

    pub fn to_iso8601(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_iso8601()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_renders_whole_seconds() {
        let rendered = Timestamp::now().to_iso8601();
        assert_eq!(rendered.len(), "2027-03-01T09:00:00Z".len());
        assert!(rendered.ends_with('Z'));
    }

    #[test]
    fn fractional_seconds_are_dropped() {
        let ts = Timestamp::parse("2027-03-01T09:15:30.987Z").unwrap();
        assert_eq!(ts.to_string(), "2027-03-01T09:15:30Z");
        assert_eq!(ts, Timestamp::parse("2027-03-01T09:15:30Z").unwrap());
    }

    #[test]
    fn non_utc_offsets_are_rejected() {
        for raw in ["2027-03-01T09:00:00+00:00", "2027-03-01T14:00:00+05:00", "yesterday"] {
            assert!(
                matches!(Timestamp::parse(raw), Err(ValidationError::InvalidTimestamp { .. })),
                "{raw}"
            );
        }
    }

    #[test]
    fn publish_after_create_orders_later() {
        let created = Timestamp::parse("2027-03-01T09:00:00Z").unwrap();
        let published = Timestamp::parse("2027-03-01T09:00:01Z").unwrap();
        assert!(created < published);
    }

    #[test]
    fn serde_uses_the_wire_string() {
        let ts = Timestamp::parse("2027-03-01T09:00:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2027-03-01T09:00:00Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
        assert!(serde_json::from_str::<Timestamp>("\"2027-03-01\"").is_err());
    }
}
