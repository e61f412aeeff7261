//! # ratebook-schema: Rule Document Schema
//!
//! Everything about the shape of a RuleSet's `rules` tree:
//!
//! - [`SchemaVersion`]: the `major.minor.patch` structural version.
//! - [`CompatibilityChecker`]: which versions this evaluator can interpret,
//!   the embedded-version check, and legacy shims.
//! - [`RuleDocument`]: the typed rule model for schema major 1.
//! - [`DocumentValidator`]: JSON Schema conformance at draft time and policy
//!   coherence at publish time.
//!
//! This crate knows nothing about RuleSet lifecycle or evaluation; it only
//! answers "can this document be read, and does it make sense".

pub mod compat;
pub mod document;
pub mod error;
pub mod validate;
pub mod version;

pub use compat::{legacy_v0_9_shim, CompatibilityChecker, CompatibilityShim, Resolution, ShimFn};
pub use document::{
    AggregateCondition, AggregateDiscount, Adjustment, DiscountKind, DiscountRule, LineCondition,
    LineDiscount, PriceTier, ProductRule, QuoteCondition, QuoteDiscount, RuleDocument,
    StackingMode,
};
pub use error::{DocumentError, SchemaCompatibilityError, Violation, Violations};
pub use validate::{check_configuration, DocumentValidator};
pub use version::SchemaVersion;
