//! Core CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::types::OutputFormat;

/// Aproximar: progressive attention-approximation pipelines
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "aproximar")]
#[command(author = "PAIML")]
#[command(version)]
#[command(
    about = "Stage-by-stage replacement of attention modules with trainable approximations"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a pipeline configuration without running it
    Validate(ValidateArgs),

    /// Show registered approximations, or the stages of a configuration
    Info(InfoArgs),

    /// Run a pipeline, replaying recorded validation metrics
    Run(RunArgs),

    /// Inspect the checkpoints written by a run
    Inspect(InspectArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to JSON or YAML pipeline configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Pipeline configuration; lists the registry when omitted
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the run command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Path to JSON or YAML pipeline configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Recorded per-stage validation metrics (JSON)
    #[arg(short, long)]
    pub trace: PathBuf,

    /// Checkpoint directory
    #[arg(short, long, default_value = "./checkpoints")]
    pub output_dir: PathBuf,

    /// Initial model (JSON); a fresh encoder is built when omitted
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Encoder layers of the fresh model
    #[arg(long, default_value_t = 2)]
    pub layers: usize,

    /// Embedding dimension of the fresh model
    #[arg(long, default_value_t = 64)]
    pub embed_dim: i64,

    /// Attention heads of the fresh model
    #[arg(long, default_value_t = 8)]
    pub num_heads: i64,

    /// Resume at this stage position, seeded from the previous stage's best checkpoint
    #[arg(long, value_name = "POSITION")]
    pub resume_from: Option<usize>,

    /// Delete superseded checkpoint payloads
    #[arg(long)]
    pub prune_superseded: bool,

    /// Report format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the inspect command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// Checkpoint directory written by `run`
    #[arg(value_name = "DIR")]
    pub checkpoints: PathBuf,

    /// Only show this stage index
    #[arg(short, long)]
    pub stage: Option<i64>,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
