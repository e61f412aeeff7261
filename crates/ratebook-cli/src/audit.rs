//! # Audit Subcommand
//!
//! Reproduces every QuoteVersion in an export file against the RuleSets
//! exported with it and prints the report. Fails unless every version
//! reproduced exactly.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use tracing::error;

use ratebook_engine::Evaluator;
use ratebook_quote::{audit_export, AuditExport, AuditReport};
use ratebook_schema::CompatibilityChecker;

use crate::input::load;
use crate::Outcome;

/// Arguments for the audit subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Export file: `{rulesets: [...], quote_versions: [...]}`.
    pub export: PathBuf,
}

pub fn audit(args: &AuditArgs, checker: &CompatibilityChecker) -> anyhow::Result<AuditReport> {
    let export: AuditExport = load(&args.export)?;
    Ok(audit_export(&Evaluator::new(checker.clone()), &export))
}

pub fn run(
    args: &AuditArgs,
    checker: &CompatibilityChecker,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    let report = audit(args, checker)?;
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    if !report.is_clean() {
        error!(
            export = %args.export.display(),
            diverged = report.diverged.len(),
            failed = report.failed.len(),
            "audit found quote versions that do not reproduce"
        );
    }
    Ok(report.is_clean().into())
}
