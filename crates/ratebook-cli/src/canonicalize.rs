//! # Canonicalize Subcommand
//!
//! Prints the exact bytes checksums are computed over: sorted keys, no
//! insignificant whitespace, floats rejected.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use ratebook_core::CanonicalBytes;

use crate::input::load_value;

/// Arguments for the canonicalize subcommand.
#[derive(Args, Debug)]
pub struct CanonicalizeArgs {
    /// JSON or YAML document.
    pub file: PathBuf,
}

pub fn run(args: &CanonicalizeArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let value = load_value(&args.file)?;
    let canonical = CanonicalBytes::new(&value)
        .with_context(|| format!("canonicalizing {}", args.file.display()))?;
    out.write_all(canonical.as_bytes())?;
    writeln!(out)?;
    Ok(())
}
