//! CLI entrypoint for the slabmalloc harness.

use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use slabmalloc_core::HeapConfig;
use slabmalloc_harness::churn::{self, ChurnParams};
use slabmalloc_harness::{HarnessError, scenarios, structured_log};

/// Scenario and stress tooling for slabmalloc.
#[derive(Debug, Parser)]
#[command(name = "slabmalloc-harness")]
#[command(about = "Scenario and stress harness for slabmalloc")]
struct Cli {
    /// Dump the allocator's lifecycle records as JSON lines to stderr.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every contract scenario against a fresh allocator and print a JSON report.
    Scenarios,
    /// Run a seeded allocate/free storm and print JSON metrics.
    Churn {
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF", value_parser = parse_seed)]
        seed: u64,
        /// Number of allocate/free operations.
        #[arg(long, default_value_t = 10_000)]
        ops: usize,
        /// Largest request size in bytes.
        #[arg(long, default_value_t = 4096)]
        max_size: usize,
    },
}

fn parse_seed(raw: &str) -> Result<u64, String> {
    let cleaned = raw.replace('_', "");
    let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse(),
    };
    parsed.map_err(|err| format!("invalid seed {raw:?}: {err}"))
}

fn run(cli: Cli) -> Result<bool, HarnessError> {
    let config = HeapConfig::from_env();
    let stdout = std::io::stdout();
    let (ok, logs) = match cli.command {
        Command::Scenarios => {
            let (report, logs) = scenarios::run_all(config);
            serde_json::to_writer_pretty(stdout.lock(), &report)?;
            (report.all_passed(), logs)
        }
        Command::Churn { seed, ops, max_size } => {
            let (report, logs) = churn::run(config, ChurnParams { seed, ops, max_size })?;
            serde_json::to_writer_pretty(stdout.lock(), &report)?;
            (report.is_clean(), logs)
        }
    };
    writeln!(stdout.lock())?;
    if cli.log_json {
        structured_log::write_json_lines(std::io::stderr().lock(), &logs)?;
    }
    Ok(ok)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("slabmalloc-harness: {err}");
            ExitCode::from(2)
        }
    }
}
