//! # Evaluation Result and Trace
//!
//! The output of one evaluation. Contains no timestamps or identifiers of
//! its own, so two evaluations of the same rules and context serialize to
//! identical canonical bytes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ratebook_core::{CanonicalBytes, CanonicalizationError, Currency};
use ratebook_schema::DiscountKind;

/// A discount applied to a line or to the quote. `amount` is negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub rule_id: String,
    pub kind: DiscountKind,
    pub amount: Decimal,
}

/// One priced line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub code: String,
    pub quantity: u32,
    /// Effective unit price after tier selection.
    pub unit_price: Decimal,
    /// `unit_price × quantity`.
    pub base_subtotal: Decimal,
    #[serde(default)]
    pub discounts: Vec<AppliedDiscount>,
    /// Base subtotal less line and cross-line discounts.
    pub subtotal: Decimal,
}

/// What kind of rule a trace entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceRuleKind {
    BasePrice,
    TierPrice,
    PerLine,
    CrossLine,
    WholeQuote,
}

impl From<DiscountKind> for TraceRuleKind {
    fn from(kind: DiscountKind) -> Self {
        match kind {
            DiscountKind::PerLine => Self::PerLine,
            DiscountKind::CrossLine => Self::CrossLine,
            DiscountKind::WholeQuote => Self::WholeQuote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOutcome {
    Matched,
    Skipped,
}

/// One rule considered during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// 1-based position in evaluation order.
    pub step: u32,
    pub rule_id: String,
    pub rule_kind: TraceRuleKind,
    /// The line the rule was considered for; absent for quote-level rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_code: Option<String>,
    pub outcome: TraceOutcome,
    pub reason: String,
    /// Signed monetary effect of a matched discount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Decimal>,
}

impl TraceEntry {
    pub fn is_matched(&self) -> bool {
        self.outcome == TraceOutcome::Matched
    }
}

/// Output of [`Evaluator::evaluate`](crate::Evaluator::evaluate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub quote_discounts: Vec<AppliedDiscount>,
    /// Sum of line base subtotals.
    pub base_subtotal: Decimal,
    /// Sum of line subtotals, before whole-quote discounts.
    pub subtotal: Decimal,
    pub total: Decimal,
    pub currency: Currency,
    pub trace: Vec<TraceEntry>,
}

impl EvaluationResult {
    /// Canonical bytes used for determinism and reproduction comparisons.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }

    pub fn line(&self, code: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|l| l.code == code)
    }

    /// Trace entries for one rule, in order.
    pub fn trace_for<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a TraceEntry> {
        self.trace.iter().filter(move |t| t.rule_id == rule_id)
    }
}
