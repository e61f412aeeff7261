//! # Pricing Context
//!
//! Caller input to an evaluation. Ephemeral; a QuoteVersion keeps a copy as
//! its input snapshot.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use ratebook_core::Currency;

use crate::error::EvaluationError;

/// One requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    /// Product code, resolved against the RuleSet's products.
    pub code: String,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(code: impl Into<String>, quantity: u32) -> Self {
        Self {
            code: code.into(),
            quantity,
        }
    }
}

/// Everything an evaluation may look at besides the rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingContext {
    pub items: Vec<LineRequest>,
    /// Tiering signal for engagement-size discounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_size: Option<u64>,
    /// Supplied promotional codes. Codes no rule mentions are ignored.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub promo_codes: BTreeSet<String>,
    /// Requested currency. `None` means the RuleSet's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl PricingContext {
    pub fn new(items: impl IntoIterator<Item = LineRequest>) -> Self {
        Self {
            items: items.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_engagement_size(mut self, size: u64) -> Self {
        self.engagement_size = Some(size);
        self
    }

    pub fn with_promo_code(mut self, code: impl Into<String>) -> Self {
        self.promo_codes.insert(code.into());
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// At least one line, every quantity positive, each product once.
    pub fn validate(&self) -> Result<(), EvaluationError> {
        if self.items.is_empty() {
            return Err(EvaluationError::InvalidContext(
                "at least one line item is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.quantity == 0 {
                return Err(EvaluationError::InvalidContext(format!(
                    "line '{}' has quantity 0",
                    item.code
                )));
            }
            if !seen.insert(item.code.as_str()) {
                return Err(EvaluationError::InvalidContext(format!(
                    "product '{}' is requested more than once",
                    item.code
                )));
            }
        }
        Ok(())
    }

    /// Sum of quantities over lines whose code satisfies `in_scope`.
    pub fn total_quantity(&self, in_scope: impl Fn(&str) -> bool) -> u64 {
        self.items
            .iter()
            .filter(|i| in_scope(&i.code))
            .map(|i| u64::from(i.quantity))
            .sum()
    }
}
