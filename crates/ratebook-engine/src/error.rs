//! # Evaluation Errors
//!
//! Every variant aborts the whole evaluation. There is no partial price.

use thiserror::Error;

use ratebook_core::Currency;
use ratebook_schema::SchemaCompatibilityError;
use ratebook_state::RuleSetIntegrityError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// The RuleSet's schema version cannot be interpreted by this evaluator.
    #[error(transparent)]
    SchemaCompatibility(#[from] SchemaCompatibilityError),

    /// The stored checksum no longer covers the stored rules.
    #[error(transparent)]
    Integrity(#[from] RuleSetIntegrityError),

    /// The normalized rules do not fit the typed model.
    #[error("rules cannot be interpreted: {0}")]
    MalformedRules(String),

    /// A requested code has no base-price rule.
    #[error("unknown product '{code}'")]
    UnknownProduct { code: String },

    /// The context asks for a currency other than the RuleSet's.
    #[error("currency {requested} is not supported (rules are priced in {supported})")]
    UnsupportedCurrency {
        requested: Currency,
        supported: Currency,
    },

    /// An amount left the representable decimal range.
    #[error("amount out of range while computing {at}")]
    Overflow { at: String },

    /// The pricing context itself is malformed.
    #[error("invalid pricing context: {0}")]
    InvalidContext(String),
}
