//! # Evaluate Subcommand
//!
//! Prices a context against a rule document without a server. The document
//! goes through a throwaway in-memory registry (draft, then publish) so it
//! gets exactly the checks a stored RuleSet would.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::info;

use ratebook_core::{Checksum, Currency, FirmId, RuleSetCode};
use ratebook_engine::{EvaluationResult, Evaluator, PricingContext};
use ratebook_schema::{CompatibilityChecker, SchemaVersion};
use ratebook_state::{InMemoryRuleSetStore, NewRuleSet, RuleSetRegistry};

use crate::input::{embedded_version, load, load_value};

/// Arguments for the evaluate subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// JSON or YAML rule document.
    pub ruleset: PathBuf,

    /// JSON or YAML pricing context.
    pub context: PathBuf,

    /// Declared schema version. Defaults to the one embedded in the document.
    #[arg(long, value_name = "VERSION")]
    pub schema_version: Option<String>,

    /// Default currency of the RuleSet.
    #[arg(long, default_value = "USD")]
    pub currency: String,

    /// Code the RuleSet is registered under.
    #[arg(long, default_value = "LOCAL")]
    pub code: String,
}

#[derive(Debug, Serialize)]
struct EvaluateOutput<'a> {
    ruleset_checksum: Checksum,
    #[serde(flatten)]
    result: &'a EvaluationResult,
}

/// Price `args.context` and return the result.
pub fn evaluate(
    args: &EvaluateArgs,
    checker: &CompatibilityChecker,
) -> anyhow::Result<(Checksum, EvaluationResult)> {
    let rules = load_value(&args.ruleset)?;
    let context: PricingContext = load(&args.context)?;
    let schema_version = match &args.schema_version {
        Some(raw) => raw.trim().parse::<SchemaVersion>()?,
        None => embedded_version(&rules)?,
    };

    let registry = RuleSetRegistry::new(Arc::new(InMemoryRuleSetStore::new()), checker.clone())?;
    let firm = FirmId::new();
    let draft = registry
        .create_draft(
            firm,
            NewRuleSet {
                code: RuleSetCode::new(args.code.clone())?,
                version: Some(1),
                schema_version,
                default_currency: Currency::new(args.currency.clone())?,
                rules,
            },
        )
        .with_context(|| format!("loading {}", args.ruleset.display()))?;
    let ruleset = registry
        .publish(&firm, &draft.id)
        .with_context(|| format!("{} is not publishable", args.ruleset.display()))?;

    let result = Evaluator::new(checker.clone())
        .evaluate(&ruleset, &context)
        .with_context(|| format!("evaluating {}", args.context.display()))?;
    info!(checksum = %ruleset.checksum, total = %result.total, "evaluated");
    Ok((ruleset.checksum, result))
}

pub fn run(
    args: &EvaluateArgs,
    checker: &CompatibilityChecker,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let (ruleset_checksum, result) = evaluate(args, checker)?;
    let output = EvaluateOutput {
        ruleset_checksum,
        result: &result,
    };
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}
