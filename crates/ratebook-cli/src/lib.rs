//! # ratebook-cli: Ratebook Command-Line Interface
//!
//! Offline tooling over rule documents and exported quote data. Every
//! command reads JSON or YAML (chosen by file extension) and writes its
//! result to stdout; logs go to stderr.
//!
//! ## Subcommands
//!
//! - `canonicalize`: Print the canonical byte form of a document
//! - `checksum`: Print (or verify) the checksum of a rule document
//! - `validate`: Draft-time or publish-time validation of a rule document
//! - `evaluate`: Price a context against a rule document
//! - `audit`: Reproduce every quote version in an export
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers take parsed args and a
//!   writer so they can be driven from tests.
//! - Handlers delegate to the domain crates. No pricing logic here.

use anyhow::Context;

use ratebook_schema::{CompatibilityChecker, SchemaVersion};

pub mod audit;
pub mod canonicalize;
pub mod checksum;
pub mod evaluate;
pub mod input;
pub mod validate;

/// What a checking command concluded.
///
/// I/O and parse problems are errors; a document that was read fine but
/// failed the check is [`Outcome::Fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn passed(self) -> bool {
        self == Self::Pass
    }
}

impl From<bool> for Outcome {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

/// Build the compatibility checker from `--supported-schema` overrides.
///
/// No overrides gives the standard set. Overrides replace the supported
/// versions but keep the shipped shims.
pub fn checker(overrides: &[String]) -> anyhow::Result<CompatibilityChecker> {
    if overrides.is_empty() {
        return Ok(CompatibilityChecker::standard());
    }
    let versions = overrides
        .iter()
        .map(|raw| {
            raw.trim()
                .parse::<SchemaVersion>()
                .with_context(|| format!("--supported-schema {raw}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(CompatibilityChecker::new(versions).with_standard_shims())
}
