//! # Quote Manager
//!
//! Ties the registry, the evaluator and the quote store together. New
//! prices are only ever computed against a published RuleSet; reproduction
//! also accepts a deprecated one, since deprecation never alters rules.

use tracing::{info, warn};

use ratebook_core::{FirmId, QuoteId, QuoteVersionId, RuleSetId};
use ratebook_engine::{EvaluationResult, Evaluator, PricingContext};
use ratebook_state::{RuleSet, RuleSetRegistry, RuleSetStatus};

use crate::error::QuoteError;
use crate::quote::{Quote, QuoteVersion};
use crate::reproduce::{reproduce, AuditExport, AuditReport, ReproductionReport};
use crate::store::InMemoryQuoteStore;

/// Quote workflow service. Cheap to clone; clones share storage.
#[derive(Debug, Clone)]
pub struct QuoteManager {
    registry: RuleSetRegistry,
    evaluator: Evaluator,
    store: InMemoryQuoteStore,
}

impl QuoteManager {
    /// The evaluator is built from the registry's compatibility checker.
    pub fn new(registry: RuleSetRegistry) -> Self {
        let evaluator = Evaluator::new(registry.checker().clone());
        Self::with_evaluator(registry, evaluator)
    }

    pub fn with_evaluator(registry: RuleSetRegistry, evaluator: Evaluator) -> Self {
        Self {
            registry,
            evaluator,
            store: InMemoryQuoteStore::new(),
        }
    }

    pub fn registry(&self) -> &RuleSetRegistry {
        &self.registry
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Price a context against `(ruleset_id, ruleset_version)` without
    /// persisting anything.
    pub fn evaluate(
        &self,
        firm_id: &FirmId,
        ruleset_id: &RuleSetId,
        ruleset_version: u32,
        context: &PricingContext,
    ) -> Result<(RuleSet, EvaluationResult), QuoteError> {
        let ruleset = self.resolve(firm_id, ruleset_id, ruleset_version)?;
        if ruleset.status != RuleSetStatus::Published {
            return Err(QuoteError::NotPublished {
                ruleset_id: ruleset.id,
                status: ruleset.status,
            });
        }
        let result = self.evaluator.evaluate(&ruleset, context)?;
        Ok((ruleset, result))
    }

    // ── Quotes ───────────────────────────────────────────────────────

    pub fn create_quote(&self, firm_id: FirmId, title: &str) -> Result<Quote, QuoteError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(QuoteError::Invalid("quote title must not be empty".into()));
        }
        let quote = Quote::new(firm_id, title);
        self.store.insert_quote(quote.clone());
        info!(quote_id = %quote.id, firm_id = %firm_id, "quote created");
        Ok(quote)
    }

    pub fn get_quote(&self, firm_id: &FirmId, id: &QuoteId) -> Result<Quote, QuoteError> {
        self.store
            .get_quote(firm_id, id)
            .ok_or_else(|| QuoteError::NotFound(format!("quote {id}")))
    }

    pub fn list_quotes(&self, firm_id: &FirmId) -> Vec<Quote> {
        self.store.list_quotes(firm_id)
    }

    // ── Versions ─────────────────────────────────────────────────────

    /// Evaluate and persist a new QuoteVersion on `quote_id`.
    pub fn add_version(
        &self,
        firm_id: &FirmId,
        quote_id: &QuoteId,
        ruleset_id: &RuleSetId,
        ruleset_version: u32,
        context: PricingContext,
    ) -> Result<QuoteVersion, QuoteError> {
        // Fail on an unknown quote before doing any pricing work.
        self.get_quote(firm_id, quote_id)?;
        let (ruleset, result) = self.evaluate(firm_id, ruleset_id, ruleset_version, &context)?;

        let version = self
            .store
            .append_version(firm_id, quote_id, |quote| {
                QuoteVersion::snapshot(quote, &ruleset, &context, &result)
            })
            .ok_or_else(|| QuoteError::NotFound(format!("quote {quote_id}")))?;

        info!(
            quote_id = %quote_id,
            quote_version_id = %version.id,
            sequence = version.sequence,
            ruleset_id = %ruleset.id,
            ruleset_version = ruleset.version,
            checksum = %ruleset.checksum,
            total = %version.output_snapshot.total,
            "quote version recorded"
        );
        Ok(version)
    }

    pub fn get_version(
        &self,
        firm_id: &FirmId,
        id: &QuoteVersionId,
    ) -> Result<QuoteVersion, QuoteError> {
        self.store
            .get_version(firm_id, id)
            .ok_or_else(|| QuoteError::NotFound(format!("quote version {id}")))
    }

    pub fn versions(&self, firm_id: &FirmId, quote_id: &QuoteId) -> Vec<QuoteVersion> {
        self.store.versions_of(firm_id, quote_id)
    }

    // ── Reproduction ─────────────────────────────────────────────────

    /// Reload the referenced RuleSet and re-derive a stored version.
    pub fn reproduce(
        &self,
        firm_id: &FirmId,
        id: &QuoteVersionId,
    ) -> Result<ReproductionReport, QuoteError> {
        let version = self.get_version(firm_id, id)?;
        self.reproduce_version(&version)
    }

    fn reproduce_version(&self, version: &QuoteVersion) -> Result<ReproductionReport, QuoteError> {
        let reference = &version.ruleset;
        let ruleset = self.resolve(
            &version.firm_id,
            &reference.ruleset_id,
            reference.ruleset_version,
        )?;
        reproduce(&self.evaluator, &ruleset, version)
    }

    /// Reproduce every stored QuoteVersion of a firm.
    pub fn audit(&self, firm_id: &FirmId) -> AuditReport {
        let mut report = AuditReport::default();
        for version in self.store.list_versions(firm_id) {
            report.record(version.id, self.reproduce_version(&version));
        }
        info!(
            firm_id = %firm_id,
            checked = report.checked,
            matched = report.matched,
            diverged = report.diverged.len(),
            failed = report.failed.len(),
            "quote audit complete"
        );
        report
    }

    /// A firm's QuoteVersions plus every RuleSet they reference, for an
    /// offline audit.
    pub fn export(&self, firm_id: &FirmId) -> AuditExport {
        let quote_versions = self.store.list_versions(firm_id);
        let mut rulesets: Vec<RuleSet> = Vec::new();
        for version in &quote_versions {
            let id = version.ruleset.ruleset_id;
            if rulesets.iter().any(|rs| rs.id == id) {
                continue;
            }
            match self.registry.get(firm_id, &id) {
                Ok(rs) => rulesets.push(rs),
                Err(e) => warn!(
                    firm_id = %firm_id,
                    ruleset_id = %id,
                    quote_version_id = %version.id,
                    error = %e,
                    "export omits a referenced ruleset"
                ),
            }
        }
        AuditExport {
            rulesets,
            quote_versions,
        }
    }

    fn resolve(
        &self,
        firm_id: &FirmId,
        ruleset_id: &RuleSetId,
        ruleset_version: u32,
    ) -> Result<RuleSet, QuoteError> {
        let ruleset = self.registry.get(firm_id, ruleset_id)?;
        if ruleset.version != ruleset_version {
            return Err(QuoteError::NotFound(format!(
                "ruleset {ruleset_id} v{ruleset_version}"
            )));
        }
        Ok(ruleset)
    }
}
