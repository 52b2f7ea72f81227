//! Aproximar CLI
//!
//! # Usage
//!
//! ```bash
//! # Check a pipeline document
//! aproximar validate pipeline.json --detailed
//!
//! # List registered approximations
//! aproximar info
//!
//! # Dry-run a pipeline against recorded metrics
//! aproximar run pipeline.json --trace metrics.json --output-dir ./checkpoints
//!
//! # Show what a run published
//! aproximar inspect ./checkpoints
//! ```

use aproximar::cli::{init_tracing, run_command, Cli, LogLevel};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(LogLevel::from_flags(cli.verbose, cli.quiet));

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
