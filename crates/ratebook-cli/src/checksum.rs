//! # Checksum Subcommand
//!
//! Prints `sha256:<hex>` over a rule document's canonical bytes. With
//! `--expect`, compares against a known checksum instead and fails on
//! mismatch.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::error;

use ratebook_core::Checksum;

use crate::input::load_value;
use crate::Outcome;

/// Arguments for the checksum subcommand.
#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// JSON or YAML rule document.
    pub file: PathBuf,

    /// Checksum the document must have, e.g. `sha256:ab12...`.
    #[arg(long, value_name = "CHECKSUM")]
    pub expect: Option<String>,
}

pub fn run(args: &ChecksumArgs, out: &mut impl Write) -> anyhow::Result<Outcome> {
    let value = load_value(&args.file)?;
    let actual = Checksum::compute(&value)
        .with_context(|| format!("checksumming {}", args.file.display()))?;

    let Some(raw) = &args.expect else {
        writeln!(out, "{actual}")?;
        return Ok(Outcome::Pass);
    };

    let expected: Checksum = raw
        .trim()
        .parse()
        .with_context(|| format!("--expect {raw}"))?;
    if expected == actual {
        writeln!(out, "ok {actual}")?;
        Ok(Outcome::Pass)
    } else {
        error!(file = %args.file.display(), %expected, %actual, "checksum mismatch");
        writeln!(out, "mismatch: expected {expected}, actual {actual}")?;
        Ok(Outcome::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_rules() -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        f.write_all(br#"{"schema_version": "1.0.0", "products": [{"code": "BASIC", "unit_price": "1000.00"}]}"#)
            .unwrap();
        f
    }

    fn expected() -> Checksum {
        Checksum::compute(&json!({
            "products": [{"unit_price": "1000.00", "code": "BASIC"}],
            "schema_version": "1.0.0"
        }))
        .unwrap()
    }

    #[test]
    fn prints_checksum() {
        let f = temp_rules();
        let mut out = Vec::new();
        let args = ChecksumArgs { file: f.path().to_path_buf(), expect: None };
        assert_eq!(run(&args, &mut out).unwrap(), Outcome::Pass);
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", expected()));
    }

    #[test]
    fn expect_match_passes() {
        let f = temp_rules();
        let mut out = Vec::new();
        let args = ChecksumArgs {
            file: f.path().to_path_buf(),
            expect: Some(expected().to_string()),
        };
        assert_eq!(run(&args, &mut out).unwrap(), Outcome::Pass);
    }

    #[test]
    fn expect_mismatch_fails() {
        let f = temp_rules();
        let other = Checksum::compute(&json!({"schema_version": "1.0.0"})).unwrap();
        let mut out = Vec::new();
        let args = ChecksumArgs {
            file: f.path().to_path_buf(),
            expect: Some(other.to_string()),
        };
        assert_eq!(run(&args, &mut out).unwrap(), Outcome::Fail);
        assert!(String::from_utf8(out).unwrap().starts_with("mismatch"));
    }

    #[test]
    fn malformed_expectation_is_an_error() {
        let f = temp_rules();
        let args = ChecksumArgs {
            file: f.path().to_path_buf(),
            expect: Some("md5:abc".into()),
        };
        assert!(run(&args, &mut Vec::new()).is_err());
    }
}
