//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! aproximar validate pipeline.json
//! aproximar info
//! aproximar info pipeline.yaml --format json
//! aproximar run pipeline.json --trace metrics.json --output-dir ./checkpoints
//! aproximar run pipeline.json --trace metrics.json --resume-from 2
//! aproximar inspect ./checkpoints
//! ```

mod core;
mod types;

pub use core::{parse_args, Cli, Command, InfoArgs, InspectArgs, RunArgs, ValidateArgs};
pub use types::OutputFormat;
