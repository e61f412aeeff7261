//! # Pricing Evaluator
//!
//! A pure function of `(rules, context)`:
//!
//! ```text
//! RuleSet ──▶ schema compatibility ──▶ checksum ──▶ typed parse
//!                                                       │
//! context ──▶ validate ──▶ currency ──▶ resolve products
//!                                                       ▼
//!   base price / tier ──▶ per_line ──▶ cross_line ──▶ whole_quote
//! ```
//!
//! Discount phases run in that fixed order. Within a phase rules run by
//! ascending priority, ties in definition order. Stacking is per rule:
//!
//! - `exclusive`: applies, then every later rule in any phase is skipped
//!   for that line (or for the quote, in the whole-quote phase).
//! - `additive`: a percentage of the amount at the start of the phase.
//! - `multiplicative`: a percentage of the running amount.
//!
//! Every adjustment is rounded to cents and clamped so no line and no quote
//! goes below zero. Every rule considered lands in the trace. A rule whose
//! product scope excludes a line is not considered for that line.

use rust_decimal::Decimal;
use tracing::{debug, error};

use ratebook_core::Currency;
use ratebook_schema::{
    Adjustment, AggregateCondition, CompatibilityChecker, DiscountKind, DiscountRule,
    LineCondition, ProductRule, QuoteCondition, RuleDocument, StackingMode,
};
use ratebook_state::RuleSet;

use crate::context::{LineRequest, PricingContext};
use crate::error::EvaluationError;
use crate::money::{checked_sum, extend, percent_of, round_money};
use crate::result::{
    AppliedDiscount, EvaluationResult, LineItem, TraceEntry, TraceOutcome, TraceRuleKind,
};

/// Stateless evaluator. Holds only the schema versions it understands.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    checker: CompatibilityChecker,
}

impl Evaluator {
    pub fn new(checker: CompatibilityChecker) -> Self {
        Self { checker }
    }

    /// Supported versions 1.0.0 and 1.1.0 with the standard shims.
    pub fn standard() -> Self {
        Self::new(CompatibilityChecker::standard())
    }

    pub fn checker(&self) -> &CompatibilityChecker {
        &self.checker
    }

    /// Evaluate a stored RuleSet.
    ///
    /// Schema compatibility and checksum integrity are established before
    /// any pricing math. Lifecycle status is the caller's concern.
    pub fn evaluate(
        &self,
        ruleset: &RuleSet,
        context: &PricingContext,
    ) -> Result<EvaluationResult, EvaluationError> {
        let normalized = self
            .checker
            .normalize(&ruleset.schema_version, &ruleset.rules)?;

        if let Err(e) = ruleset.ensure_integrity(&ruleset.checksum) {
            error!(
                ruleset_id = %ruleset.id,
                code = %ruleset.code,
                version = ruleset.version,
                error = %e,
                "ruleset failed integrity check before evaluation"
            );
            return Err(e.into());
        }

        let document = RuleDocument::from_value(&normalized)
            .map_err(|e| EvaluationError::MalformedRules(e.to_string()))?;
        let result = price(&document, &ruleset.default_currency, context)?;
        debug!(
            ruleset_id = %ruleset.id,
            lines = result.line_items.len(),
            total = %result.total,
            trace_entries = result.trace.len(),
            "evaluation complete"
        );
        Ok(result)
    }
}

/// Price a typed document. The core of [`Evaluator::evaluate`], without the
/// storage-level checks.
pub fn price(
    document: &RuleDocument,
    currency: &Currency,
    context: &PricingContext,
) -> Result<EvaluationResult, EvaluationError> {
    context.validate()?;
    if let Some(requested) = &context.currency {
        if requested != currency {
            return Err(EvaluationError::UnsupportedCurrency {
                requested: requested.clone(),
                supported: currency.clone(),
            });
        }
    }

    let products = context
        .items
        .iter()
        .map(|item| {
            document
                .product(&item.code)
                .ok_or_else(|| EvaluationError::UnknownProduct {
                    code: item.code.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let per_line = plan(document, DiscountKind::PerLine)?;
    let cross_line = plan(document, DiscountKind::CrossLine)?;
    let whole_quote = plan(document, DiscountKind::WholeQuote)?;

    let mut trace = Trace::default();
    let mut lines: Vec<LineState<'_>> = context
        .items
        .iter()
        .zip(products)
        .map(|(request, product)| LineState::priced(request, product, &mut trace))
        .collect::<Result<_, _>>()?;

    for line in &mut lines {
        apply_per_line(line, &per_line, &mut trace)?;
    }
    apply_cross_line(&mut lines, &cross_line, context, &mut trace)?;

    let base_subtotal = checked_sum(lines.iter().map(|l| l.base_subtotal))
        .ok_or_else(|| overflow("base subtotal"))?;
    let subtotal =
        checked_sum(lines.iter().map(|l| l.amount)).ok_or_else(|| overflow("subtotal"))?;
    let (total, quote_discounts) = apply_whole_quote(subtotal, &whole_quote, context, &mut trace)?;

    Ok(EvaluationResult {
        line_items: lines.into_iter().map(LineState::finish).collect(),
        quote_discounts,
        base_subtotal,
        subtotal,
        total,
        currency: currency.clone(),
        trace: trace.entries,
    })
}

// ─── Planning ────────────────────────────────────────────────────────

struct Planned<'a> {
    rule: &'a DiscountRule,
    stacking: StackingMode,
}

/// Rules of one kind in evaluation order. A rule without a stacking mode
/// cannot be evaluated; publish rejects such documents, so this only fires
/// for unpublished input.
fn plan(document: &RuleDocument, kind: DiscountKind) -> Result<Vec<Planned<'_>>, EvaluationError> {
    let mut planned = document
        .discounts
        .iter()
        .filter(|r| r.kind() == kind)
        .map(|rule| {
            rule.stacking()
                .map(|stacking| Planned { rule, stacking })
                .ok_or_else(|| {
                    EvaluationError::MalformedRules(format!(
                        "discount '{}' declares no stacking mode",
                        rule.id()
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    // Stable: equal priorities keep definition order.
    planned.sort_by_key(|p| p.rule.priority());
    Ok(planned)
}

// ─── Trace ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    fn push(
        &mut self,
        rule_id: &str,
        rule_kind: TraceRuleKind,
        line_code: Option<&str>,
        outcome: TraceOutcome,
        reason: String,
        adjustment: Option<Decimal>,
    ) {
        let step = u32::try_from(self.entries.len() + 1).unwrap_or(u32::MAX);
        self.entries.push(TraceEntry {
            step,
            rule_id: rule_id.to_string(),
            rule_kind,
            line_code: line_code.map(str::to_string),
            outcome,
            reason,
            adjustment,
        });
    }

    fn matched(
        &mut self,
        rule_id: &str,
        kind: TraceRuleKind,
        line_code: Option<&str>,
        reason: String,
        adjustment: Option<Decimal>,
    ) {
        self.push(rule_id, kind, line_code, TraceOutcome::Matched, reason, adjustment);
    }

    fn skipped(&mut self, rule_id: &str, kind: TraceRuleKind, line_code: Option<&str>, reason: String) {
        self.push(rule_id, kind, line_code, TraceOutcome::Skipped, reason, None);
    }
}

fn overflow(at: impl Into<String>) -> EvaluationError {
    EvaluationError::Overflow { at: at.into() }
}

fn superseded(by: &str) -> String {
    format!("superseded by exclusive rule {by}")
}

// ─── Lines ───────────────────────────────────────────────────────────

struct LineState<'a> {
    request: &'a LineRequest,
    unit_price: Decimal,
    base_subtotal: Decimal,
    /// Running line amount after discounts so far.
    amount: Decimal,
    discounts: Vec<AppliedDiscount>,
    locked_by: Option<String>,
}

impl<'a> LineState<'a> {
    /// Resolve the unit price (base or tier) and trace how it was chosen.
    fn priced(
        request: &'a LineRequest,
        product: &ProductRule,
        trace: &mut Trace,
    ) -> Result<Self, EvaluationError> {
        let code = request.code.as_str();
        let quantity = request.quantity;
        let base_price = round_money(product.unit_price);
        trace.matched(
            &product.code,
            TraceRuleKind::BasePrice,
            Some(code),
            format!("unit_price={base_price}"),
            None,
        );

        let selected = product.tier_for(quantity);
        let mut tiers: Vec<_> = product.tiers.iter().collect();
        tiers.sort_by_key(|t| t.min_quantity);
        for tier in tiers {
            let tier_id = format!("{}:tier:{}", product.code, tier.min_quantity);
            if quantity < tier.min_quantity {
                trace.skipped(
                    &tier_id,
                    TraceRuleKind::TierPrice,
                    Some(code),
                    format!("qty<{}", tier.min_quantity),
                );
            } else if selected.is_some_and(|s| s.min_quantity == tier.min_quantity) {
                trace.matched(
                    &tier_id,
                    TraceRuleKind::TierPrice,
                    Some(code),
                    format!("qty>={} unit_price={}", tier.min_quantity, round_money(tier.unit_price)),
                    None,
                );
            } else {
                trace.skipped(
                    &tier_id,
                    TraceRuleKind::TierPrice,
                    Some(code),
                    "superseded by higher tier".to_string(),
                );
            }
        }

        let unit_price = selected.map_or(base_price, |t| round_money(t.unit_price));
        let base_subtotal = extend(unit_price, quantity)
            .ok_or_else(|| overflow(format!("line {code} ({quantity} x {unit_price})")))?;
        Ok(Self {
            request,
            unit_price,
            base_subtotal,
            amount: base_subtotal,
            discounts: Vec::new(),
            locked_by: None,
        })
    }

    fn code(&self) -> &str {
        &self.request.code
    }

    fn apply(&mut self, rule: &DiscountRule, amount: Decimal) -> Decimal {
        self.amount -= amount;
        let signed = negate(amount);
        self.discounts.push(AppliedDiscount {
            rule_id: rule.id().to_string(),
            kind: rule.kind(),
            amount: signed,
        });
        signed
    }

    fn finish(self) -> LineItem {
        LineItem {
            code: self.request.code.clone(),
            quantity: self.request.quantity,
            unit_price: self.unit_price,
            base_subtotal: self.base_subtotal,
            discounts: self.discounts,
            subtotal: round_money(self.amount),
        }
    }
}

/// Size of one matched adjustment, clamped to `[0, running]`.
fn adjustment_amount(
    rule_id: &str,
    adjustment: &Adjustment,
    stacking: StackingMode,
    phase_base: Decimal,
    running: Decimal,
) -> Result<Decimal, EvaluationError> {
    let raw = match adjustment {
        Adjustment::Percent { value } => {
            let base = match stacking {
                StackingMode::Additive => phase_base,
                StackingMode::Multiplicative | StackingMode::Exclusive => running,
            };
            percent_of(base, *value).ok_or_else(|| overflow(format!("discount {rule_id}")))?
        }
        Adjustment::Amount { value } => round_money(*value),
    };
    Ok(round_money(raw.min(running).max(Decimal::ZERO)))
}

fn negate(amount: Decimal) -> Decimal {
    if amount.is_zero() {
        amount
    } else {
        -amount
    }
}

// ─── Phases ──────────────────────────────────────────────────────────

fn apply_per_line(
    line: &mut LineState<'_>,
    rules: &[Planned<'_>],
    trace: &mut Trace,
) -> Result<(), EvaluationError> {
    let phase_base = line.amount;
    let kind = TraceRuleKind::PerLine;
    for planned in rules {
        let DiscountRule::PerLine(rule) = planned.rule else {
            continue;
        };
        if !planned.rule.covers(line.code()) {
            continue;
        }
        let request = line.request;
        let code = request.code.as_str();
        if let Some(by) = &line.locked_by {
            trace.skipped(&rule.id, kind, Some(code), superseded(by));
            continue;
        }

        let quantity = request.quantity;
        let (met, reason) = match rule.condition {
            LineCondition::Always => (true, "always".to_string()),
            LineCondition::MinQuantity { value } if quantity >= value => {
                (true, format!("qty>={value}"))
            }
            LineCondition::MinQuantity { value } => (false, format!("qty<{value}")),
        };
        if !met {
            trace.skipped(&rule.id, kind, Some(code), reason);
            continue;
        }

        let amount = adjustment_amount(
            &rule.id,
            &rule.adjustment,
            planned.stacking,
            phase_base,
            line.amount,
        )?;
        let signed = line.apply(planned.rule, amount);
        trace.matched(&rule.id, kind, Some(code), reason, Some(signed));
        if planned.stacking == StackingMode::Exclusive {
            line.locked_by = Some(rule.id.clone());
        }
    }
    Ok(())
}

fn apply_cross_line(
    lines: &mut [LineState<'_>],
    rules: &[Planned<'_>],
    context: &PricingContext,
    trace: &mut Trace,
) -> Result<(), EvaluationError> {
    let phase_bases: Vec<Decimal> = lines.iter().map(|l| l.amount).collect();
    let kind = TraceRuleKind::CrossLine;
    for planned in rules {
        let DiscountRule::CrossLine(rule) = planned.rule else {
            continue;
        };
        let in_scope: Vec<usize> = (0..lines.len())
            .filter(|&i| planned.rule.covers(lines[i].code()))
            .collect();
        if in_scope.is_empty() {
            trace.skipped(&rule.id, kind, None, "no requested line in scope".to_string());
            continue;
        }

        let (met, reason) = match rule.condition {
            AggregateCondition::MinTotalQuantity { value } => {
                let total = context.total_quantity(|c| planned.rule.covers(c));
                if total >= u64::from(value) {
                    (true, format!("total_qty>={value}"))
                } else {
                    (false, format!("total_qty<{value}"))
                }
            }
            AggregateCondition::MinEngagementSize { value } => match context.engagement_size {
                None => (false, "engagement_size missing".to_string()),
                Some(size) if size >= value => (true, format!("engagement_size>={value}")),
                Some(_) => (false, format!("engagement_size<{value}")),
            },
        };

        for i in in_scope {
            let line = &mut lines[i];
            let request = line.request;
            let code = request.code.as_str();
            if let Some(by) = &line.locked_by {
                trace.skipped(&rule.id, kind, Some(code), superseded(by));
                continue;
            }
            if !met {
                trace.skipped(&rule.id, kind, Some(code), reason.clone());
                continue;
            }
            let amount = adjustment_amount(
                &rule.id,
                &rule.adjustment,
                planned.stacking,
                phase_bases[i],
                line.amount,
            )?;
            let signed = line.apply(planned.rule, amount);
            trace.matched(&rule.id, kind, Some(code), reason.clone(), Some(signed));
            if planned.stacking == StackingMode::Exclusive {
                line.locked_by = Some(rule.id.clone());
            }
        }
    }
    Ok(())
}

fn apply_whole_quote(
    subtotal: Decimal,
    rules: &[Planned<'_>],
    context: &PricingContext,
    trace: &mut Trace,
) -> Result<(Decimal, Vec<AppliedDiscount>), EvaluationError> {
    let kind = TraceRuleKind::WholeQuote;
    let mut running = subtotal;
    let mut applied = Vec::new();
    let mut locked_by: Option<&str> = None;

    for planned in rules {
        let DiscountRule::WholeQuote(rule) = planned.rule else {
            continue;
        };
        if let Some(by) = locked_by {
            trace.skipped(&rule.id, kind, None, superseded(by));
            continue;
        }

        let (met, reason) = match &rule.condition {
            QuoteCondition::Always => (true, "always".to_string()),
            QuoteCondition::PromoCode { code } if context.promo_codes.contains(code) => {
                (true, format!("promo:{code}"))
            }
            QuoteCondition::PromoCode { code } => (false, format!("promo code {code} not supplied")),
            QuoteCondition::MinSubtotal { amount } if subtotal >= *amount => {
                (true, format!("subtotal>={amount}"))
            }
            QuoteCondition::MinSubtotal { amount } => (false, format!("subtotal<{amount}")),
        };
        if !met {
            trace.skipped(&rule.id, kind, None, reason);
            continue;
        }

        let amount =
            adjustment_amount(&rule.id, &rule.adjustment, planned.stacking, subtotal, running)?;
        running -= amount;
        let signed = negate(amount);
        applied.push(AppliedDiscount {
            rule_id: rule.id.clone(),
            kind: DiscountKind::WholeQuote,
            amount: signed,
        });
        trace.matched(&rule.id, kind, None, reason, Some(signed));
        if planned.stacking == StackingMode::Exclusive {
            locked_by = Some(rule.id.as_str());
        }
    }

    Ok((round_money(running), applied))
}
