//! # Validate Subcommand
//!
//! Runs the same checks the registry runs: schema compatibility and
//! structure for a draft, plus configuration coherence with `--publish`.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use ratebook_core::Checksum;
use ratebook_schema::{CompatibilityChecker, DocumentError, DocumentValidator, Resolution, SchemaVersion};

use crate::input::{embedded_version, load_value};
use crate::Outcome;

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// JSON or YAML rule document.
    pub file: PathBuf,

    /// Declared schema version. Defaults to the one embedded in the document.
    #[arg(long, value_name = "VERSION")]
    pub schema_version: Option<String>,

    /// Apply publish-time checks as well.
    #[arg(long)]
    pub publish: bool,
}

pub fn run(
    args: &ValidateArgs,
    checker: &CompatibilityChecker,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    let rules = load_value(&args.file)?;
    let declared = match &args.schema_version {
        Some(raw) => raw.trim().parse::<SchemaVersion>()?,
        None => embedded_version(&rules)?,
    };

    if let Err(e) = Checksum::compute(&rules) {
        writeln!(out, "invalid: {e}")?;
        return Ok(Outcome::Fail);
    }

    let resolution = match checker.validate(&declared, &rules) {
        Ok(r) => r,
        Err(e) => {
            writeln!(out, "incompatible: {e}")?;
            return Ok(Outcome::Fail);
        }
    };
    let normalized = match checker.normalize(&declared, &rules) {
        Ok(n) => n,
        Err(e) => {
            writeln!(out, "incompatible: {e}")?;
            return Ok(Outcome::Fail);
        }
    };

    let validator = DocumentValidator::new()?;
    let checked = if args.publish {
        validator.validate_for_publish(&normalized).map(|_| ())
    } else {
        validator.validate_structure(&normalized)
    };
    debug!(file = %args.file.display(), publish = args.publish, "validated");

    match checked {
        Ok(()) => {
            let stage = if args.publish { "publishable" } else { "valid draft" };
            match resolution {
                Resolution::Native => writeln!(out, "ok: {stage}, schema {declared}")?,
                Resolution::Shimmed { shim, target } => writeln!(
                    out,
                    "ok: {stage}, schema {declared} (read as {target} via {shim})"
                )?,
            }
            Ok(Outcome::Pass)
        }
        Err(DocumentError::SchemaBuild(msg)) => anyhow::bail!("rule schema failed to compile: {msg}"),
        Err(DocumentError::Malformed(msg)) => {
            writeln!(out, "invalid: {msg}")?;
            Ok(Outcome::Fail)
        }
        Err(DocumentError::Structural(violations) | DocumentError::Configuration(violations)) => {
            writeln!(out, "invalid: {} problem(s)", violations.len())?;
            for v in violations.iter() {
                let path = if v.path.is_empty() { "/" } else { v.path.as_str() };
                writeln!(out, "  {path}: {}", v.message)?;
            }
            Ok(Outcome::Fail)
        }
    }
}
