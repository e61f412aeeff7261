//! # ratebook-engine: Pricing Evaluation
//!
//! Turns a RuleSet and a [`PricingContext`] into an [`EvaluationResult`]:
//! priced line items, applied discounts, a total, and an ordered trace of
//! every rule considered.
//!
//! The evaluator is stateless and holds no locks. Two evaluations of the
//! same rules and context produce byte-identical canonical output, which is
//! what makes a stored quote reproducible.

pub mod context;
pub mod error;
pub mod evaluator;
pub mod money;
pub mod result;

pub use context::{LineRequest, PricingContext};
pub use error::EvaluationError;
pub use evaluator::{price, Evaluator};
pub use money::{percent_of, round_money};
pub use result::{AppliedDiscount, EvaluationResult, LineItem, TraceEntry, TraceOutcome, TraceRuleKind};
