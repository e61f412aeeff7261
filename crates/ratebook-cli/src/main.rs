//! # ratebook CLI Entry Point
//!
//! Parses arguments, installs logging, and dispatches to the handler
//! modules. Exit status: 0 on success, 1 when a check fails, 2 on error.

use std::io::Write;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use ratebook_cli::{audit, canonicalize, checksum, evaluate, validate, Outcome};

/// Ratebook: deterministic pricing rule tooling.
///
/// Canonicalizes and checksums rule documents, validates them the way the
/// registry does, prices contexts offline, and audits exported quotes.
#[derive(Parser, Debug)]
#[command(name = "ratebook", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins if set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Schema version this evaluator supports. Repeat to add more;
    /// replaces the default set of 1.0.0 and 1.1.0.
    #[arg(long = "supported-schema", value_name = "VERSION", global = true)]
    supported_schemas: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the canonical byte form of a document.
    Canonicalize(canonicalize::CanonicalizeArgs),
    /// Print or verify the checksum of a rule document.
    Checksum(checksum::ChecksumArgs),
    /// Validate a rule document for draft or publish.
    Validate(validate::ValidateArgs),
    /// Price a context against a rule document.
    Evaluate(evaluate::EvaluateArgs),
    /// Reproduce every quote version in an export.
    Audit(audit::AuditArgs),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(cli: &Cli) -> anyhow::Result<Outcome> {
    let checker = ratebook_cli::checker(&cli.supported_schemas)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let outcome = match &cli.command {
        Commands::Canonicalize(args) => canonicalize::run(args, &mut out).map(|()| Outcome::Pass),
        Commands::Checksum(args) => checksum::run(args, &mut out),
        Commands::Validate(args) => validate::run(args, &checker, &mut out),
        Commands::Evaluate(args) => evaluate::run(args, &checker, &mut out).map(|()| Outcome::Pass),
        Commands::Audit(args) => audit::run(args, &checker, &mut out),
    }?;
    out.flush()?;
    Ok(outcome)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(&cli) {
        Ok(Outcome::Pass) => ExitCode::SUCCESS,
        Ok(Outcome::Fail) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
