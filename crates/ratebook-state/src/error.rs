//! # Registry Errors

use thiserror::Error;

use ratebook_core::{CanonicalizationError, FirmId, RuleSetCode, RuleSetId};
use ratebook_schema::{DocumentError, SchemaCompatibilityError};

use crate::ruleset::{Revision, RuleSetStatus};
use crate::store::StoreError;

/// A write touched a field that is frozen.
///
/// Published and deprecated RuleSets are immutable apart from the single
/// legal status transition. Identity fields are immutable from creation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ruleset {ruleset_id} is immutable: field '{field}' cannot change")]
pub struct ImmutableRuleSetError {
    pub ruleset_id: RuleSetId,
    pub field: &'static str,
}

/// Errors from [`RuleSetRegistry`](crate::RuleSetRegistry) operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The rule document is malformed (draft) or not publishable (publish).
    #[error(transparent)]
    Validation(#[from] DocumentError),

    /// The rules contain values that have no canonical form.
    #[error("rules cannot be canonicalized: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error(transparent)]
    SchemaCompatibility(#[from] SchemaCompatibilityError),

    #[error(transparent)]
    Immutable(#[from] ImmutableRuleSetError),

    /// A lifecycle step that is not legal from the current status.
    #[error("invalid ruleset transition: {from} -> {to}")]
    InvalidTransition {
        from: RuleSetStatus,
        to: RuleSetStatus,
    },

    #[error("ruleset {code} v{version} already exists for firm {firm_id}")]
    Duplicate {
        firm_id: FirmId,
        code: RuleSetCode,
        version: u32,
    },

    /// Input rejected before any rule checks.
    #[error("invalid ruleset: {0}")]
    Invalid(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The record changed between read and write; the caller must re-read.
    #[error("ruleset {ruleset_id} was modified concurrently (expected revision {expected}, found {actual})")]
    ConcurrentModification {
        ruleset_id: RuleSetId,
        expected: Revision,
        actual: Revision,
    },
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate {
                firm_id,
                code,
                version,
            } => Self::Duplicate {
                firm_id,
                code,
                version,
            },
            StoreError::NotFound(id) => Self::NotFound(format!("ruleset {id}")),
            StoreError::Conflict {
                id,
                expected,
                actual,
            } => Self::ConcurrentModification {
                ruleset_id: id,
                expected,
                actual,
            },
        }
    }
}
