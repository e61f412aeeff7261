//! # Quotes and QuoteVersions
//!
//! A [`Quote`] is a mutable working container: a title and an ordered list
//! of versions. A [`QuoteVersion`] is immutable from the moment it is
//! created. It carries the RuleSet reference by value (`id`, `version`,
//! `checksum`) plus full copies of the input context, the result and the
//! trace, so it can be re-derived without reading any other mutable state.

use serde::{Deserialize, Serialize};

use ratebook_core::{FirmId, QuoteId, QuoteVersionId, Timestamp};
use ratebook_engine::{EvaluationResult, PricingContext, TraceEntry};
use ratebook_state::{RuleSet, RuleSetRef};

/// Working container grouping the versions of one negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub firm_id: FirmId,
    pub title: String,
    /// Versions in creation order.
    pub version_ids: Vec<QuoteVersionId>,
    pub created_at: Timestamp,
}

impl Quote {
    pub fn new(firm_id: FirmId, title: impl Into<String>) -> Self {
        Self {
            id: QuoteId::new(),
            firm_id,
            title: title.into(),
            version_ids: Vec::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Sequence number the next version will receive.
    pub fn next_sequence(&self) -> u32 {
        u32::try_from(self.version_ids.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }
}

/// Immutable snapshot of one priced evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteVersion {
    pub id: QuoteVersionId,
    pub firm_id: FirmId,
    pub quote_id: QuoteId,
    /// 1-based position within the quote.
    pub sequence: u32,
    #[serde(flatten)]
    pub ruleset: RuleSetRef,
    pub input_context_snapshot: PricingContext,
    pub output_snapshot: EvaluationResult,
    pub trace_snapshot: Vec<TraceEntry>,
    pub created_at: Timestamp,
}

impl QuoteVersion {
    /// Wrap an evaluation into a snapshot. The RuleSet checksum is copied
    /// here and never re-read.
    pub fn snapshot(
        quote: &Quote,
        ruleset: &RuleSet,
        context: &PricingContext,
        result: &EvaluationResult,
    ) -> Self {
        Self {
            id: QuoteVersionId::new(),
            firm_id: quote.firm_id,
            quote_id: quote.id,
            sequence: quote.next_sequence(),
            ruleset: ruleset.reference(),
            input_context_snapshot: context.clone(),
            output_snapshot: result.clone(),
            trace_snapshot: result.trace.clone(),
            created_at: Timestamp::now(),
        }
    }
}
