//! # Typed Rule Document
//!
//! The in-memory model of a RuleSet's `rules` tree for schema major 1.
//!
//! ```text
//! RuleDocument
//! ├── schema_version          "1.1.0"
//! ├── products[]              base-price rules, optional quantity tiers
//! └── discounts[]             closed set of kinds, each with explicit stacking
//!     ├── per_line            line-scoped, LineCondition
//!     ├── cross_line          aggregate across lines, AggregateCondition
//!     └── whole_quote         applied to the quote subtotal, QuoteCondition
//! ```
//!
//! All money and percentages are `Decimal`, serialized as strings. The
//! stored RuleSet keeps the raw JSON tree (that is what the checksum
//! covers); this model is derived from it on demand.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::version::SchemaVersion;

/// A complete pricing policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub schema_version: SchemaVersion,
    pub products: Vec<ProductRule>,
    #[serde(default)]
    pub discounts: Vec<DiscountRule>,
}

impl RuleDocument {
    /// Parse a raw rule tree into the typed model.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Base-price rule for a product code.
    pub fn product(&self, code: &str) -> Option<&ProductRule> {
        self.products.iter().find(|p| p.code == code)
    }
}

/// Base-price rule for one product or service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRule {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub unit_price: Decimal,
    /// Quantity tiers. The highest `min_quantity` met replaces `unit_price`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiers: Vec<PriceTier>,
}

impl ProductRule {
    /// The tier that applies at `quantity`, if any.
    pub fn tier_for(&self, quantity: u32) -> Option<&PriceTier> {
        self.tiers
            .iter()
            .filter(|t| quantity >= t.min_quantity)
            .max_by_key(|t| t.min_quantity)
    }
}

/// Volume tier replacing a product's unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    pub min_quantity: u32,
    pub unit_price: Decimal,
}

/// How a matched discount interacts with discounts evaluated after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingMode {
    /// Applies, then stops further discounts on the same line (or quote).
    Exclusive,
    /// Percentages are taken from the amount before any discount in the phase.
    Additive,
    /// Percentages are taken from the running amount.
    Multiplicative,
}

impl StackingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Additive => "additive",
            Self::Multiplicative => "multiplicative",
        }
    }
}

/// Size of a discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Adjustment {
    /// Percentage in `(0, 100]`.
    Percent { value: Decimal },
    /// Fixed amount in the RuleSet currency.
    Amount { value: Decimal },
}

/// Condition evaluated against a single line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineCondition {
    #[default]
    Always,
    MinQuantity { value: u32 },
}

/// Condition evaluated against all in-scope lines together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregateCondition {
    MinTotalQuantity { value: u32 },
    MinEngagementSize { value: u64 },
}

/// Condition evaluated against the whole quote.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuoteCondition {
    #[default]
    Always,
    PromoCode { code: String },
    MinSubtotal { amount: Decimal },
}

/// Discount scoped to individual lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDiscount {
    pub id: String,
    #[serde(default)]
    pub priority: i32,
    /// Product codes in scope. Empty means every product.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,
    #[serde(default)]
    pub condition: LineCondition,
    pub adjustment: Adjustment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacking: Option<StackingMode>,
}

/// Discount triggered by an aggregate over lines, applied to each in-scope line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDiscount {
    pub id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,
    pub condition: AggregateCondition,
    pub adjustment: Adjustment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacking: Option<StackingMode>,
}

/// Discount applied to the quote subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteDiscount {
    pub id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub condition: QuoteCondition,
    pub adjustment: Adjustment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacking: Option<StackingMode>,
}

/// The closed set of discount rule kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountRule {
    PerLine(LineDiscount),
    CrossLine(AggregateDiscount),
    WholeQuote(QuoteDiscount),
}

/// Discriminant of [`DiscountRule`], also used to label trace entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    PerLine,
    CrossLine,
    WholeQuote,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerLine => "per_line",
            Self::CrossLine => "cross_line",
            Self::WholeQuote => "whole_quote",
        }
    }
}

impl DiscountRule {
    pub fn id(&self) -> &str {
        match self {
            Self::PerLine(r) => &r.id,
            Self::CrossLine(r) => &r.id,
            Self::WholeQuote(r) => &r.id,
        }
    }

    pub fn kind(&self) -> DiscountKind {
        match self {
            Self::PerLine(_) => DiscountKind::PerLine,
            Self::CrossLine(_) => DiscountKind::CrossLine,
            Self::WholeQuote(_) => DiscountKind::WholeQuote,
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            Self::PerLine(r) => r.priority,
            Self::CrossLine(r) => r.priority,
            Self::WholeQuote(r) => r.priority,
        }
    }

    pub fn stacking(&self) -> Option<StackingMode> {
        match self {
            Self::PerLine(r) => r.stacking,
            Self::CrossLine(r) => r.stacking,
            Self::WholeQuote(r) => r.stacking,
        }
    }

    pub fn adjustment(&self) -> &Adjustment {
        match self {
            Self::PerLine(r) => &r.adjustment,
            Self::CrossLine(r) => &r.adjustment,
            Self::WholeQuote(r) => &r.adjustment,
        }
    }

    /// Product scope. Whole-quote rules have none; an empty slice means all.
    pub fn applies_to(&self) -> &[String] {
        match self {
            Self::PerLine(r) => &r.applies_to,
            Self::CrossLine(r) => &r.applies_to,
            Self::WholeQuote(_) => &[],
        }
    }

    /// Whether the rule's scope includes `code`.
    pub fn covers(&self, code: &str) -> bool {
        let scope = self.applies_to();
        scope.is_empty() || scope.iter().any(|c| c == code)
    }
}
