//! # Quote Errors
//!
//! [`QuoteError`] sits at the top of the domain crates and absorbs every
//! lower error, so the HTTP layer and the CLI map a single type.

use thiserror::Error;

use ratebook_core::{CanonicalizationError, RuleSetId};
use ratebook_engine::EvaluationError;
use ratebook_state::{RegistryError, RuleSetIntegrityError, RuleSetStatus};

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The referenced RuleSet no longer matches the checksum a quote recorded.
    #[error(transparent)]
    Integrity(#[from] RuleSetIntegrityError),

    #[error("snapshot cannot be canonicalized: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// New quotes may only be priced against a published RuleSet.
    #[error("ruleset {ruleset_id} is {status}, not published")]
    NotPublished {
        ruleset_id: RuleSetId,
        status: RuleSetStatus,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid quote request: {0}")]
    Invalid(String),
}
