//! # Reproduction and Audit
//!
//! A QuoteVersion is reproducible when re-evaluating the RuleSet it names
//! with its stored input produces its stored output byte for byte.
//!
//! Reproduction refuses to evaluate at all unless the RuleSet's current
//! rules still hash to the checksum the QuoteVersion copied. A mismatch is
//! an [`IntegrityError`](ratebook_core::IntegrityError), never a divergence.
//!
//! The same check backs two audits: [`QuoteManager::audit`] over the live
//! store, and [`audit_export`] over an exported file.
//!
//! [`QuoteManager::audit`]: crate::QuoteManager::audit

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use ratebook_core::{CanonicalBytes, CanonicalizationError, QuoteVersionId, RuleSetId};
use ratebook_engine::{EvaluationResult, Evaluator};
use ratebook_state::{RuleSet, RuleSetRef, RuleSetStatus};

use crate::error::QuoteError;
use crate::quote::QuoteVersion;

/// Outcome of one reproduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReproductionReport {
    pub quote_version_id: QuoteVersionId,
    #[serde(flatten)]
    pub ruleset: RuleSetRef,
    #[serde(rename = "match")]
    pub matched: bool,
    /// Top-level result fields whose canonical bytes differ, in field order.
    /// `trace_snapshot` is listed when the stored trace differs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diverged_fields: Vec<String>,
}

/// Re-evaluate `version` against `ruleset` and compare.
///
/// `ruleset` must be the record named by the version's reference. Drafts
/// cannot be referenced; published and deprecated RuleSets both reproduce.
pub fn reproduce(
    evaluator: &Evaluator,
    ruleset: &RuleSet,
    version: &QuoteVersion,
) -> Result<ReproductionReport, QuoteError> {
    let reference = &version.ruleset;
    if ruleset.id != reference.ruleset_id || ruleset.version != reference.ruleset_version {
        return Err(QuoteError::NotFound(format!(
            "ruleset {} v{}",
            reference.ruleset_id, reference.ruleset_version
        )));
    }
    if ruleset.status == RuleSetStatus::Draft {
        return Err(QuoteError::NotPublished {
            ruleset_id: ruleset.id,
            status: ruleset.status,
        });
    }

    if let Err(e) = ruleset.ensure_integrity(&reference.ruleset_checksum) {
        error!(
            quote_version_id = %version.id,
            ruleset_id = %ruleset.id,
            error = %e,
            "ruleset no longer matches the checksum recorded by the quote"
        );
        return Err(e.into());
    }

    let result = evaluator.evaluate(ruleset, &version.input_context_snapshot)?;
    let diverged_fields = diverged_fields(version, &result)?;
    let matched = diverged_fields.is_empty();

    if matched {
        info!(quote_version_id = %version.id, "quote version reproduced");
    } else {
        error!(
            quote_version_id = %version.id,
            ruleset_id = %ruleset.id,
            ruleset_version = ruleset.version,
            diverged = ?diverged_fields,
            "quote version did not reproduce"
        );
    }

    Ok(ReproductionReport {
        quote_version_id: version.id,
        ruleset: reference.clone(),
        matched,
        diverged_fields,
    })
}

fn diverged_fields(
    version: &QuoteVersion,
    actual: &EvaluationResult,
) -> Result<Vec<String>, CanonicalizationError> {
    let expected = field_bytes(&version.output_snapshot)?;
    let actual_fields = field_bytes(actual)?;

    let mut diverged: Vec<String> = expected
        .into_iter()
        .zip(actual_fields)
        .filter(|((_, want), (_, got))| want != got)
        .map(|((name, _), _)| name.to_string())
        .collect();

    if CanonicalBytes::new(&version.trace_snapshot)? != CanonicalBytes::new(&actual.trace)? {
        diverged.push("trace_snapshot".to_string());
    }
    Ok(diverged)
}

fn field_bytes(
    result: &EvaluationResult,
) -> Result<[(&'static str, CanonicalBytes); 7], CanonicalizationError> {
    Ok([
        ("line_items", CanonicalBytes::new(&result.line_items)?),
        ("quote_discounts", CanonicalBytes::new(&result.quote_discounts)?),
        ("base_subtotal", CanonicalBytes::new(&result.base_subtotal)?),
        ("subtotal", CanonicalBytes::new(&result.subtotal)?),
        ("total", CanonicalBytes::new(&result.total)?),
        ("currency", CanonicalBytes::new(&result.currency)?),
        ("trace", CanonicalBytes::new(&result.trace)?),
    ])
}

// ─── Audit ───────────────────────────────────────────────────────────

/// Exported RuleSets and QuoteVersions, audited offline by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditExport {
    pub rulesets: Vec<RuleSet>,
    pub quote_versions: Vec<QuoteVersion>,
}

/// A QuoteVersion that could not be reproduced at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFailure {
    pub quote_version_id: QuoteVersionId,
    pub error: String,
}

/// Summary of reproducing a batch of QuoteVersions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub checked: usize,
    pub matched: usize,
    #[serde(default)]
    pub diverged: Vec<ReproductionReport>,
    #[serde(default)]
    pub failed: Vec<AuditFailure>,
}

impl AuditReport {
    pub fn record(&mut self, id: QuoteVersionId, outcome: Result<ReproductionReport, QuoteError>) {
        self.checked += 1;
        match outcome {
            Ok(report) if report.matched => self.matched += 1,
            Ok(report) => self.diverged.push(report),
            Err(e) => self.failed.push(AuditFailure {
                quote_version_id: id,
                error: e.to_string(),
            }),
        }
    }

    /// Every checked version reproduced.
    pub fn is_clean(&self) -> bool {
        self.diverged.is_empty() && self.failed.is_empty()
    }
}

/// Reproduce every QuoteVersion in an export against the RuleSets it carries.
pub fn audit_export(evaluator: &Evaluator, export: &AuditExport) -> AuditReport {
    let rulesets: HashMap<RuleSetId, &RuleSet> =
        export.rulesets.iter().map(|rs| (rs.id, rs)).collect();

    let mut report = AuditReport::default();
    for version in &export.quote_versions {
        let outcome = rulesets
            .get(&version.ruleset.ruleset_id)
            .filter(|rs| rs.firm_id == version.firm_id)
            .ok_or_else(|| {
                QuoteError::NotFound(format!("ruleset {}", version.ruleset.ruleset_id))
            })
            .and_then(|rs| reproduce(evaluator, rs, version));
        report.record(version.id, outcome);
    }
    info!(
        checked = report.checked,
        matched = report.matched,
        diverged = report.diverged.len(),
        failed = report.failed.len(),
        "export audit complete"
    );
    report
}
