//! CLI command implementations

mod info;
mod inspect;
mod run;
mod validate;


use crate::cli::LogLevel;
use crate::config::{Cli, Command};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.verbose, cli.quiet);

    match cli.command {
        Command::Validate(args) => validate::run_validate(args, log_level),
        Command::Info(args) => info::run_info(args, log_level),
        Command::Run(args) => run::run_pipeline(args, log_level),
        Command::Inspect(args) => inspect::run_inspect(args, log_level),
    }
}

/// Render a serializable value in a structured output format.
fn render<T: serde::Serialize + ?Sized>(
    value: &T,
    format: crate::config::OutputFormat,
) -> Result<String, String> {
    use crate::config::OutputFormat;
    match format {
        OutputFormat::Json | OutputFormat::Text => serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization error: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| format!("YAML serialization error: {e}"))
        }
    }
}

/// `Error` rendered with its structured code.
fn describe_error(context: &str, err: &crate::Error) -> String {
    format!("{context}: {err} [{}]", err.code())
}
